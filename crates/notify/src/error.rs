use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// A sender or recipient address could not be parsed.
    #[error("invalid address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(String),

    /// The mail server rejected the message or could not be reached.
    #[error("transport error: {0}")]
    Transport(String),
}

impl NotifyError {
    /// Only transport failures can succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotifyError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
