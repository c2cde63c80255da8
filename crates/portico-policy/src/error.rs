//! Policy error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("No service base URL configured")]
    MissingService,

    #[error("Invalid service URL: {0}")]
    InvalidServiceUrl(String),
}
