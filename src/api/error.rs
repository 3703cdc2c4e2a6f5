//! Failure taxonomy for calls to external collaborators.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request rejected: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid order quantity: {0}")]
    InvalidQuantity(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Run a gateway call under a hard deadline.
pub async fn with_timeout<T, F>(op: &'static str, limit: Duration, fut: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(op, limit)),
    }
}
