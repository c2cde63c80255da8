//! Service endpoint derived from a configured base URL

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PolicyError;
use crate::Result;

/// Origin and path prefix of a backend service.
///
/// The prefix never carries a trailing slash; a base URL pointing at the
/// origin root yields an empty prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    origin: String,
    host: String,
    path_prefix: String,
}

impl ServiceEndpoint {
    /// Parse a configured base URL such as `https://svc.example/api/`
    pub fn parse(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(PolicyError::MissingService);
        }

        let url = Url::parse(base_url)
            .map_err(|e| PolicyError::InvalidServiceUrl(format!("{}: {}", base_url, e)))?;
        Self::from_url(&url)
    }

    pub fn from_url(url: &Url) -> Result<Self> {
        let origin = url.origin();
        // data:, file: and friends have opaque origins that never compare equal
        if !origin.is_tuple() {
            return Err(PolicyError::InvalidServiceUrl(url.to_string()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| PolicyError::InvalidServiceUrl(url.to_string()))?;

        Ok(Self {
            origin: origin.ascii_serialization(),
            host: host.to_lowercase(),
            path_prefix: url.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Check whether `path` equals the prefix or sits below it.
    ///
    /// `/api2` is not below `/api`: the next character after the prefix
    /// must be a `/`.
    pub fn contains_path(&self, path: &str) -> bool {
        if self.path_prefix.is_empty() {
            return true;
        }

        match path.strip_prefix(self.path_prefix.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }
}
