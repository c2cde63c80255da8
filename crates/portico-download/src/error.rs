//! Download error types
//!
//! Each variant's message is what the user sees in the failure notification.

use thiserror::Error;

use portico_dispatch::{StatusCode, TransportError};
use portico_policy::DenyReason;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Invalid file URL: {0}")]
    InvalidUrl(String),

    #[error("File service is not configured correctly: {0}")]
    Configuration(String),

    #[error("Blocked: this URL is not served by the configured file service")]
    PolicyDenied(DenyReason),

    #[error("Network error while downloading: {0}")]
    Transport(#[from] TransportError),

    #[error("Download failed: server responded with {0}")]
    Upstream(StatusCode),

    #[error("The file is empty or could not be read")]
    EmptyResource,

    #[error("Could not open or save the file: {0}")]
    Delivery(String),
}
