//! Sidekick error types

use thiserror::Error;

use portico_dispatch::{StatusCode, TransportError};

/// Cloneable so one failed load can be handed to every waiting caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SidekickError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Sidekick service responded with {0}")]
    Upstream(StatusCode),

    #[error("Invalid sidekick state: {0}")]
    InvalidState(String),
}
