use thiserror::Error;

/// Failures that abort a request.
///
/// A rejected compile or a failing test is not an error: both are part of
/// the submission outcome.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, JudgeError>;

impl From<std::io::Error> for JudgeError {
    fn from(e: std::io::Error) -> Self {
        JudgeError::Internal(e.to_string())
    }
}
