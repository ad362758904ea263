use std::path::PathBuf;

/// Failures surfaced by the task store.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// Bad input: empty title, unknown priority, malformed date.
    #[error("{0}")]
    Validation(String),

    #[error("task #{0} not found")]
    NotFound(u64),

    /// The task file could not be read, written or parsed.
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TodoError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::NotFound(_) => 3,
            Self::Storage { .. } => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, TodoError>;
