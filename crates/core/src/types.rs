use thiserror::Error;

/// The main error type for WDM operations
#[derive(Debug, Error)]
pub enum WdmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invocation error: {0}")]
    Invocation(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dependency error: {0}")]
    Dependency(String),

    #[error("Circular dependency detected: {0}")]
    Cycle(String),

    #[error("Task error: {0}")]
    Task(String),

    #[error("Installation error: {0}")]
    Install(String),

    #[error("Task '{0}' was interrupted")]
    Interrupted(String),
}

impl WdmError {
    /// Process exit code for this error: `2` for invocation errors, `1` otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            WdmError::Invocation(_) => 2,
            _ => 1,
        }
    }
}

/// Result type alias for WDM operations
pub type WdmResult<T> = Result<T, WdmError>;
