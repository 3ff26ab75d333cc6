use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid Argument - {0}")]
    InvalidArgument(String),

    #[error("Out Of Range - {0}")]
    OutOfRange(String),

    #[error("Missing Argument - {0}")]
    MissingArgs(String),

    #[error("Aborted - {}", .reason.as_deref().unwrap_or("the operation was aborted"))]
    Aborted { reason: Option<String> },

    #[error("Transform Error - {0}")]
    Transform(String),

    #[error("Source Error - {0}")]
    Source(String),

    #[error("Task Error - {0}")]
    Task(String),
}

impl Error {
    /// Returns true if the error was caused by cancellation rather than by a failing source or
    /// transform.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}
