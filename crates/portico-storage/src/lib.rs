//! Portico Storage Layer
//!
//! SQLite-backed settings store. The bearer token used by the request
//! dispatcher lives here under a fixed key.

mod credentials;
mod database;
mod error;
mod migrations;

pub use credentials::{CredentialStore, MemoryCredentials, SettingsCredentials, TOKEN_KEY};
pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
