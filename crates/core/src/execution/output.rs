//! Child process output multiplexing
//!
//! Both pipes of a child are polled together; whichever is readable is read
//! once, split into lines, and each completed line is handed to the sink right
//! away. Partial lines wait in a per-stream buffer so output from stdout and
//! stderr is never spliced into a single line.

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Pending bytes of a stream's unterminated last line
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut segments = chunk.split(|&b| b == b'\n').peekable();

        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                // trailing fragment, no terminator yet
                self.pending.extend_from_slice(segment);
                break;
            }
            self.pending.extend_from_slice(segment);
            lines.push(decode_line(std::mem::take(&mut self.pending)));
        }

        lines
    }

    /// Take the unterminated fragment, if any
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(decode_line(std::mem::take(&mut self.pending)))
    }
}

fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Interleave `stdout` and `stderr` line by line into `sink` until both reach EOF
pub async fn multiplex<O, E, F>(mut stdout: O, mut stderr: E, mut sink: F) -> std::io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
    F: FnMut(OutputStream, String),
{
    let mut out_buf = vec![0u8; READ_CHUNK];
    let mut err_buf = vec![0u8; READ_CHUNK];
    let mut out_lines = LineBuffer::new();
    let mut err_lines = LineBuffer::new();
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        let (stream, read) = tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => (OutputStream::Stdout, read),
            read = stderr.read(&mut err_buf), if err_open => (OutputStream::Stderr, read),
        };
        let n = read?;

        if n == 0 {
            match stream {
                OutputStream::Stdout => out_open = false,
                OutputStream::Stderr => err_open = false,
            }
            if let Some(line) = out_lines.flush() {
                sink(OutputStream::Stdout, line);
            }
            if let Some(line) = err_lines.flush() {
                sink(OutputStream::Stderr, line);
            }
            continue;
        }

        let lines = match stream {
            OutputStream::Stdout => out_lines.push(&out_buf[..n]),
            OutputStream::Stderr => err_lines.push(&err_buf[..n]),
        };
        for line in lines {
            sink(stream, line);
        }
    }

    Ok(())
}
