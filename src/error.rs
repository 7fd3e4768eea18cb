use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Task #{seq} failed: {reason}")]
    TaskFailed { seq: u64, reason: String },

    #[error("Task #{seq} panicked: {message}")]
    TaskPanicked { seq: u64, message: String },

    #[error("Dispatch queue is stopped; submission rejected")]
    SubmitAfterStop,

    #[error("Dispatch queue is closed (owner loop gone)")]
    QueueClosed,

    #[error("{operation} called off the owner thread")]
    OwnerThreadViolation { operation: &'static str },

    #[error("{operation} called before an owner loop was started")]
    OwnerNotBound { operation: &'static str },

    #[error("Invalid widget index: {0}")]
    InvalidWidget(usize),

    #[error("Thread join error: {0}")]
    ThreadJoin(String),
}

pub type Result<T> = std::result::Result<T, Error>;
