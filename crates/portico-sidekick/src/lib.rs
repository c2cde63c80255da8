//! Portico Sidekick State
//!
//! Per-conversation UI state for the sidekick panel, keyed by chat and model:
//! - Concurrent loads of the same key share one backend call
//! - Completed loads populate a short-lived cache for synchronous reads
//! - Saves invalidate in-flight loads and write through the cache

mod backend;
mod error;
mod state;
mod store;

pub use backend::{HttpSidekickBackend, SidekickBackend, SIDEKICK_STATE_ROUTE};
pub use error::SidekickError;
pub use state::{SidekickKey, SidekickState};
pub use store::{SidekickStore, DEFAULT_CACHE_TTL};

pub type Result<T> = std::result::Result<T, SidekickError>;
