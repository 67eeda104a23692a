mod client;
mod decoder;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use client::ApiClient;
pub use decoder::{decode, DecodeError};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("API call cancelled by shutdown")]
    Cancelled,

    #[error("API call timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("API call failed")]
    Network(#[source] reqwest::Error),

    #[error("API returned status {status}: {reason}")]
    Status {
        status: reqwest::StatusCode,
        reason: String,
    },
}

impl TransportError {
    /// Timeouts and shutdown both abort the call early and are not alarming.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled | TransportError::TimedOut(_))
    }
}

/// One bounded fetch of the raw availability payload.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Bytes, TransportError>;
}
