//! Delivery platform port
//!
//! Object handles, new-context opening and anchor-based saving are the only
//! platform-specific operations in resource delivery. They sit behind
//! `DeliveryPlatform` so delivery can run headless.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use uuid::Uuid;

use crate::materialize::MaterializedResource;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Opening a new context was blocked")]
    Blocked,

    #[error("Object handle already revoked: {0}")]
    Revoked(String),

    #[error("Unknown anchor: {0}")]
    UnknownAnchor(u64),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<io::Error> for PlatformError {
    fn from(e: io::Error) -> Self {
        PlatformError::Io(e.to_string())
    }
}

/// Temporary, revocable local reference to a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle(String);

impl ObjectHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(pub u64);

/// Link element used to trigger delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: ObjectHandle,
    /// Save-as name; `None` navigates instead of saving
    pub download: Option<String>,
    /// Display name of the target, used where navigation ends in a file
    pub name: Option<String>,
    /// Open in a new browsing context
    pub new_context: bool,
    /// Sever the opener reference (`rel="noopener"`)
    pub no_opener: bool,
}

impl Anchor {
    /// Anchor that opens `href` in a new context without an opener
    pub fn open(href: ObjectHandle, name: impl Into<String>) -> Self {
        Self {
            href,
            download: None,
            name: Some(name.into()),
            new_context: true,
            no_opener: true,
        }
    }

    /// Anchor that saves `href` as `filename`
    pub fn save_as(href: ObjectHandle, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            href,
            download: Some(filename.clone()),
            name: Some(filename),
            new_context: false,
            no_opener: true,
        }
    }
}

pub trait DeliveryPlatform: Send + Sync {
    fn create_object_url(&self, resource: &MaterializedResource) -> Result<ObjectHandle, PlatformError>;

    /// Open `handle` in a new context with no opener reference
    fn open_in_new_context(&self, handle: &ObjectHandle) -> Result<(), PlatformError>;

    fn insert_anchor(&self, anchor: Anchor) -> Result<AnchorId, PlatformError>;

    fn click_anchor(&self, id: AnchorId) -> Result<(), PlatformError>;

    fn remove_anchor(&self, id: AnchorId);

    fn revoke_object_url(&self, handle: &ObjectHandle) -> Result<(), PlatformError>;
}

/// Headless platform backed by the file system.
///
/// Object handles are files in a staging directory; anchor saves copy the
/// staged file into the download directory. There is no viewer, so opening
/// a new context always reports `Blocked`.
pub struct DirectoryPlatform {
    staging_dir: PathBuf,
    download_dir: PathBuf,
    staged: Mutex<HashMap<ObjectHandle, PathBuf>>,
    anchors: Mutex<HashMap<AnchorId, Anchor>>,
    next_anchor: AtomicU64,
}

impl DirectoryPlatform {
    pub fn new(staging_dir: PathBuf, download_dir: PathBuf) -> Self {
        Self {
            staging_dir,
            download_dir,
            staged: Mutex::new(HashMap::new()),
            anchors: Mutex::new(HashMap::new()),
            next_anchor: AtomicU64::new(1),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Number of handles not yet revoked
    pub fn live_handles(&self) -> usize {
        self.staged.lock().len()
    }

    /// Create a file named `name` in the download directory, numbering
    /// the name until one is free. Never opens an existing file.
    fn create_target(&self, name: &str) -> Result<(File, PathBuf), PlatformError> {
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        };

        let mut n = 0;
        loop {
            let candidate = match (n, ext) {
                (0, _) => name.to_string(),
                (_, Some(ext)) => format!("{}-{}.{}", stem, n, ext),
                (_, None) => format!("{}-{}", stem, n),
            };
            let path = self.download_dir.join(candidate);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl DeliveryPlatform for DirectoryPlatform {
    fn create_object_url(&self, resource: &MaterializedResource) -> Result<ObjectHandle, PlatformError> {
        std::fs::create_dir_all(&self.staging_dir)?;

        let id = Uuid::new_v4().to_string();
        let path = self.staging_dir.join(&id);
        std::fs::write(&path, &resource.bytes)?;

        let handle = ObjectHandle::new(format!("blob:portico/{}", id));
        self.staged.lock().insert(handle.clone(), path);
        Ok(handle)
    }

    fn open_in_new_context(&self, _handle: &ObjectHandle) -> Result<(), PlatformError> {
        Err(PlatformError::Blocked)
    }

    fn insert_anchor(&self, anchor: Anchor) -> Result<AnchorId, PlatformError> {
        let id = AnchorId(self.next_anchor.fetch_add(1, Ordering::Relaxed));
        self.anchors.lock().insert(id, anchor);
        Ok(id)
    }

    fn click_anchor(&self, id: AnchorId) -> Result<(), PlatformError> {
        let anchor = self
            .anchors
            .lock()
            .get(&id)
            .cloned()
            .ok_or(PlatformError::UnknownAnchor(id.0))?;

        let source = self
            .staged
            .lock()
            .get(&anchor.href)
            .cloned()
            .ok_or_else(|| PlatformError::Revoked(anchor.href.to_string()))?;

        let name = match anchor.download.as_deref().or(anchor.name.as_deref()) {
            Some(name) if !name.is_empty() && name != "." && name != ".." && !name.contains('/') => {
                name.to_string()
            }
            _ => source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "download".to_string()),
        };

        std::fs::create_dir_all(&self.download_dir)?;
        let (mut file, target) = self.create_target(&name)?;
        let mut staged = File::open(&source)?;
        io::copy(&mut staged, &mut file)?;

        tracing::info!(href = %anchor.href, path = %target.display(), "Saved resource");
        Ok(())
    }

    fn remove_anchor(&self, id: AnchorId) {
        self.anchors.lock().remove(&id);
    }

    fn revoke_object_url(&self, handle: &ObjectHandle) -> Result<(), PlatformError> {
        let path = self
            .staged
            .lock()
            .remove(handle)
            .ok_or_else(|| PlatformError::Revoked(handle.to_string()))?;
        std::fs::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(dir: &Path) -> DirectoryPlatform {
        DirectoryPlatform::new(dir.join("staging"), dir.join("downloads"))
    }

    #[test]
    fn test_save_via_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let platform = platform(dir.path());

        let handle = platform
            .create_object_url(&MaterializedResource::new(&b"hello"[..], "text/plain"))
            .unwrap();
        let id = platform
            .insert_anchor(Anchor::save_as(handle.clone(), "hello.txt"))
            .unwrap();
        platform.click_anchor(id).unwrap();
        platform.remove_anchor(id);

        let saved = std::fs::read(dir.path().join("downloads").join("hello.txt")).unwrap();
        assert_eq!(saved, b"hello");
        assert!(matches!(
            platform.click_anchor(id),
            Err(PlatformError::UnknownAnchor(_))
        ));
    }

    #[test]
    fn test_existing_file_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let platform = platform(dir.path());

        for body in [&b"one"[..], &b"two"[..]] {
            let handle = platform
                .create_object_url(&MaterializedResource::new(body, ""))
                .unwrap();
            let id = platform.insert_anchor(Anchor::save_as(handle, "a.bin")).unwrap();
            platform.click_anchor(id).unwrap();
        }

        let downloads = dir.path().join("downloads");
        assert_eq!(std::fs::read(downloads.join("a.bin")).unwrap(), b"one");
        assert_eq!(std::fs::read(downloads.join("a-1.bin")).unwrap(), b"two");
    }

    #[test]
    fn test_opened_resource_keeps_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let platform = platform(dir.path());

        let handle = platform
            .create_object_url(&MaterializedResource::new(&b"%PDF"[..], "application/pdf"))
            .unwrap();
        assert_eq!(platform.open_in_new_context(&handle), Err(PlatformError::Blocked));

        let id = platform.insert_anchor(Anchor::open(handle, "report.pdf")).unwrap();
        platform.click_anchor(id).unwrap();

        let saved = std::fs::read(dir.path().join("downloads").join("report.pdf")).unwrap();
        assert_eq!(saved, b"%PDF");
    }

    #[test]
    fn test_concurrent_saves_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let platform = platform(dir.path());

        std::thread::scope(|scope| {
            for i in 0..8u8 {
                let platform = &platform;
                scope.spawn(move || {
                    let handle = platform
                        .create_object_url(&MaterializedResource::new(vec![i], ""))
                        .unwrap();
                    let id = platform.insert_anchor(Anchor::save_as(handle, "same.bin")).unwrap();
                    platform.click_anchor(id).unwrap();
                });
            }
        });

        let mut contents: Vec<Vec<u8>> = std::fs::read_dir(dir.path().join("downloads"))
            .unwrap()
            .map(|entry| std::fs::read(entry.unwrap().path()).unwrap())
            .collect();
        contents.sort();
        assert_eq!(contents, (0..8u8).map(|i| vec![i]).collect::<Vec<_>>());
    }

    #[test]
    fn test_revoke_is_single_shot() {
        let dir = tempfile::tempdir().unwrap();
        let platform = platform(dir.path());

        let handle = platform
            .create_object_url(&MaterializedResource::new(&b"x"[..], ""))
            .unwrap();
        assert_eq!(platform.live_handles(), 1);

        platform.revoke_object_url(&handle).unwrap();
        assert_eq!(platform.live_handles(), 0);
        assert!(matches!(
            platform.revoke_object_url(&handle),
            Err(PlatformError::Revoked(_))
        ));
    }

    #[test]
    fn test_open_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let platform = platform(dir.path());
        let handle = ObjectHandle::new("blob:portico/none");
        assert_eq!(
            platform.open_in_new_context(&handle),
            Err(PlatformError::Blocked)
        );
    }
}
