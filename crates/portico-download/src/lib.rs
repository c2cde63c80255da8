//! Portico Resource Delivery
//!
//! Fetches a remote resource through the credentialed dispatcher and hands
//! it to the user:
//! - Origin/path validation before any fetch (unless explicitly bypassed)
//! - Payload materialization regardless of how the transport exposed it
//! - Inline-vs-download classification and filename sanitization
//! - Temporary object handles revoked after a fixed grace window
//!
//! Every failure ends in a user-visible notification.

mod classify;
mod downloader;
mod error;
mod lifecycle;
mod materialize;
mod notify;
mod platform;

pub use classify::{
    classify, clamp_filename, derive_filename, is_viewable, sanitize_filename, DeliveryDecision,
    DeliveryMode, DEFAULT_FILENAME, MAX_FILENAME_LEN, PROXY_DOWNLOAD_SUFFIX,
};
pub use downloader::{DownloadOptions, Downloader};
pub use error::DownloadError;
pub use lifecycle::{LifecycleManager, DOWNLOAD_STARTED_MESSAGE, OPENED_MESSAGE, REVOKE_AFTER};
pub use materialize::{materialize, MaterializedResource, EXTRACTORS};
pub use notify::{NotificationKind, Notifier, TracingNotifier};
pub use platform::{Anchor, AnchorId, DeliveryPlatform, DirectoryPlatform, ObjectHandle, PlatformError};

pub type Result<T> = std::result::Result<T, DownloadError>;
