//! Resource lifecycle management
//!
//! Hands a materialized resource to the platform and guarantees its object
//! handle is released after `REVOKE_AFTER`, however it was consumed.

use std::sync::Arc;
use std::time::Duration;

use crate::classify::{DeliveryDecision, DeliveryMode};
use crate::error::DownloadError;
use crate::materialize::MaterializedResource;
use crate::notify::Notifier;
use crate::platform::{Anchor, DeliveryPlatform, ObjectHandle, PlatformError};
use crate::Result;

/// Grace window before an object handle is revoked
pub const REVOKE_AFTER: Duration = Duration::from_secs(60);

pub const OPENED_MESSAGE: &str = "Opened in a new tab";
pub const DOWNLOAD_STARTED_MESSAGE: &str = "Download started";

#[derive(Clone)]
pub struct LifecycleManager {
    platform: Arc<dyn DeliveryPlatform>,
    notifier: Arc<dyn Notifier>,
}

impl LifecycleManager {
    pub fn new(platform: Arc<dyn DeliveryPlatform>, notifier: Arc<dyn Notifier>) -> Self {
        Self { platform, notifier }
    }

    pub fn platform(&self) -> &Arc<dyn DeliveryPlatform> {
        &self.platform
    }

    /// Deliver `resource` according to `decision`.
    ///
    /// Revocation is scheduled as soon as a handle exists, even when the
    /// delivery itself fails afterwards.
    pub fn deliver(&self, resource: &MaterializedResource, decision: &DeliveryDecision) -> Result<()> {
        let handle = self
            .platform
            .create_object_url(resource)
            .map_err(|e| DownloadError::Delivery(e.to_string()))?;

        self.schedule_revoke(handle.clone());

        let delivered = match decision.mode {
            DeliveryMode::Inline => self.open_inline(&handle, &decision.filename),
            DeliveryMode::Download => self.save_as(&handle, &decision.filename),
        };

        delivered.map_err(|e| DownloadError::Delivery(e.to_string()))?;

        tracing::info!(
            mode = decision.mode.as_str(),
            filename = %decision.filename,
            bytes = resource.len(),
            "Delivered resource"
        );
        Ok(())
    }

    /// Send the user-facing notification for a finished download.
    pub fn report(&self, outcome: &Result<DeliveryDecision>) {
        match outcome {
            Ok(decision) => match decision.mode {
                DeliveryMode::Inline => self.notifier.success(OPENED_MESSAGE),
                DeliveryMode::Download => self.notifier.success(DOWNLOAD_STARTED_MESSAGE),
            },
            Err(e) => self.notifier.error(&e.to_string()),
        }
    }

    fn open_inline(&self, handle: &ObjectHandle, filename: &str) -> std::result::Result<(), PlatformError> {
        match self.platform.open_in_new_context(handle) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!(error = %e, "Inline open refused; falling back to anchor");
                self.click_through(Anchor::open(handle.clone(), filename))
            }
        }
    }

    fn save_as(&self, handle: &ObjectHandle, filename: &str) -> std::result::Result<(), PlatformError> {
        self.click_through(Anchor::save_as(handle.clone(), filename))
    }

    /// Insert, click, and remove an anchor
    fn click_through(&self, anchor: Anchor) -> std::result::Result<(), PlatformError> {
        let id = self.platform.insert_anchor(anchor)?;
        let clicked = self.platform.click_anchor(id);
        self.platform.remove_anchor(id);
        clicked
    }

    fn schedule_revoke(&self, handle: ObjectHandle) {
        let platform = Arc::clone(&self.platform);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(REVOKE_AFTER).await;
                    revoke(platform.as_ref(), &handle);
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(REVOKE_AFTER);
                    revoke(platform.as_ref(), &handle);
                });
            }
        }
    }
}

fn revoke(platform: &dyn DeliveryPlatform, handle: &ObjectHandle) {
    if let Err(e) = platform.revoke_object_url(handle) {
        tracing::debug!(handle = %handle, error = %e, "Ignoring revoke failure");
    }
}
