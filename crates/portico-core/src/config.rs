//! Portico configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use portico_dispatch::BackendConfig;
use portico_policy::{DevHostnames, TrustPolicy};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend services; malformed base URLs surface at request time
    pub backend: BackendConfig,
    /// Origin the client itself is served from
    pub page_origin: Option<String>,
    /// Treat loopback aliases as one origin
    pub dev_mode: bool,
    /// Path to the settings database (holds the bearer token)
    pub database_path: PathBuf,
    /// Where saved resources land
    pub download_dir: PathBuf,
    /// Where object handles are staged until revoked
    pub staging_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub sidekick_cache_ttl_secs: u64,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        let download_dir = dirs::download_dir().unwrap_or_else(|| data_dir.join("Downloads"));

        Self {
            backend: BackendConfig::default(),
            page_origin: None,
            dev_mode: cfg!(debug_assertions),
            database_path: data_dir.join("portico.db"),
            download_dir,
            staging_dir: data_dir.join("staging"),
            request_timeout_secs: 30,
            sidekick_cache_ttl_secs: 10,
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Portico"))
            .unwrap_or_else(|| PathBuf::from(".portico"))
    }

    /// Parse JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&raw)?;

        tracing::info!(
            path = %path.display(),
            service = config.backend.selected.as_str(),
            dev_mode = config.dev_mode,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn dev_hostnames(&self) -> DevHostnames {
        DevHostnames::for_build(self.dev_mode)
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy::new(self.page_origin.clone(), self.dev_hostnames())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sidekick_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.sidekick_cache_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

// Simple dirs implementation for common directories
mod dirs {
    use std::path::PathBuf;

    fn home() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("USERPROFILE").ok().map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var("HOME").ok().map(PathBuf::from)
        }
    }

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            home().map(|h| h.join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| home().map(|h| h.join(".local/share")))
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    pub fn download_dir() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DOWNLOAD_DIR")
                .ok()
                .map(PathBuf::from)
                .or_else(|| home().map(|h| h.join("Downloads")))
        }
        #[cfg(not(target_os = "linux"))]
        {
            home().map(|h| h.join("Downloads"))
        }
    }
}
