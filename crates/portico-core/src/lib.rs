//! Portico Core
//!
//! Wires the resource delivery stack together:
//! - Loads configuration (backend services, dev aliasing, paths)
//! - Builds the dispatcher, downloader and sidekick store over shared
//!   transport and credentials
//! - Sets up logging

mod config;
mod error;
mod portico;

pub use config::Config;
pub use error::CoreError;
pub use portico::Portico;

// Re-export core components
pub use portico_dispatch::{
    ApiRequest, BackendConfig, Dispatcher, HttpResponse, HttpTransport, QueryRename,
    ReqwestTransport, ResponseType, ServiceConfig, ServiceSelection, TransportError,
};
pub use portico_download::{
    DeliveryDecision, DeliveryMode, DeliveryPlatform, DirectoryPlatform, DownloadError,
    DownloadOptions, Downloader, Notifier, TracingNotifier,
};
pub use portico_policy::{DenyReason, DevHostnames, TrustDecision, TrustPolicy};
pub use portico_sidekick::{SidekickError, SidekickKey, SidekickState, SidekickStore};
pub use portico_storage::{CredentialStore, Database, SettingsCredentials, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
