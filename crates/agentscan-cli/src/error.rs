use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] agentscan_core::ValidationError),

    #[error(transparent)]
    Core(#[from] agentscan_core::CoreError),

    #[error("agent {0} was not found")]
    NotFound(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Core(agentscan_core::CoreError::Validation(_)) => 2,
            Self::Core(_) => 3,
            Self::NotFound(_) => 4,
            Self::Serialization(_) => 5,
            Self::Io(_) => 10,
        }
    }
}
