use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_yaml::Value;
use tempfile::NamedTempFile;

use crate::execution::command::ProcessInvocation;
use crate::types::WdmResult;

const ANSIBLE_PLAYBOOK: &str = "ansible-playbook";
const ENV_ANSIBLE_CONFIG: &str = "ANSIBLE_CONFIG";

/// One local Ansible play wrapping the steps of an automation task
#[derive(Debug, Serialize)]
struct Play<'a> {
    name: String,
    connection: &'static str,
    gather_facts: bool,
    hosts: &'static str,
    tasks: &'a [Value],
}

/// A play written to disk, removed when dropped
#[derive(Debug)]
pub struct PlaybookFile {
    file: NamedTempFile,
}

impl PlaybookFile {
    /// Write the play for `task_name` into a fresh file inside `dir`.
    ///
    /// The file must live next to the caller so relative role paths resolve.
    pub fn write(dir: &Path, task_name: &str, steps: &[Value]) -> WdmResult<Self> {
        let play = [Play {
            name: format!("Run {}", task_name),
            connection: "local",
            gather_facts: false,
            hosts: "localhost",
            tasks: steps,
        }];

        let mut file = tempfile::Builder::new()
            .prefix(".wdm_play_")
            .suffix(".yaml")
            .tempfile_in(dir)?;
        file.write_all(serde_yaml::to_string(&play)?.as_bytes())?;
        file.flush()?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// `ansible-playbook` invocation for this play
    pub fn invocation(
        &self,
        label: &str,
        extra_vars: &IndexMap<String, String>,
        ansible_config: Option<&Path>,
    ) -> ProcessInvocation {
        let mut invocation =
            ProcessInvocation::new(label, ANSIBLE_PLAYBOOK).arg(self.path().display().to_string());

        for (key, value) in extra_vars {
            tracing::debug!("[ansible] extra var: {}={}", key, value);
            invocation = invocation
                .arg("--extra-vars")
                .arg(format!("{}={}", key, value));
        }

        if let Some(config) = ansible_config {
            invocation = invocation.env(ENV_ANSIBLE_CONFIG, config.display().to_string());
        }

        invocation
    }
}
