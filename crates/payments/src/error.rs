use domain::ValidationError;
use thiserror::Error;

/// Errors returned by payment processor adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The processor could not confirm a successful payment for the
    /// reference: declined, unknown, or an unreadable answer.
    #[error("payment verification failed: {0}")]
    VerificationFailed(String),

    /// The processor refused to open a checkout session.
    #[error("payment initialization failed: {0}")]
    Initialization(String),

    /// The request cannot be expressed within the processor's limits. Nothing
    /// was sent.
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    #[error("payment processor timed out")]
    Timeout,

    /// The request never produced a usable HTTP response.
    #[error("payment processor request failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Http(err.to_string())
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
