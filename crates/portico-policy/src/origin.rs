//! Origin trust evaluation
//!
//! Implements the "same service" check used before attaching credentials.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::endpoint::ServiceEndpoint;

/// Loopback hostnames treated as interchangeable in development builds
pub const LOOPBACK_ALIASES: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No usable service endpoint was configured
    MissingService,
    /// The target or service URL could not be parsed
    InvalidUrl,
    /// Target origin differs from the service and no dev alias applies
    OriginMismatch,
    /// Origin matched but the path is outside the service prefix
    PathOutsidePrefix,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingService => "missing_service",
            DenyReason::InvalidUrl => "invalid_url",
            DenyReason::OriginMismatch => "origin_mismatch",
            DenyReason::PathOutsidePrefix => "path_outside_prefix",
        }
    }
}

/// Outcome of evaluating one request target. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustDecision {
    /// Caller opted out of validation
    Bypassed,
    /// Target belongs to the configured service
    Allowed,
    Denied(DenyReason),
}

impl TrustDecision {
    /// True only for a positive origin/path match; bypass does not count
    pub fn is_allowed(&self) -> bool {
        matches!(self, TrustDecision::Allowed)
    }

    /// True when the caller may proceed (allowed or bypassed)
    pub fn permits(&self) -> bool {
        !matches!(self, TrustDecision::Denied(_))
    }
}

/// Hostnames considered aliases of one another.
///
/// Empty outside development builds so production traffic never trusts
/// loopback aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevHostnames {
    hosts: HashSet<String>,
}

impl DevHostnames {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn loopback() -> Self {
        Self {
            hosts: LOOPBACK_ALIASES.iter().map(|h| h.to_string()).collect(),
        }
    }

    pub fn for_build(dev_mode: bool) -> Self {
        if dev_mode {
            Self::loopback()
        } else {
            Self::none()
        }
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    fn contains_origin_of(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|h| self.contains(h))
    }
}

/// Evaluate `target` against `service`.
///
/// `page_origin` is the origin the client itself is served from, used only
/// for development aliasing.
pub fn evaluate(
    target: &Url,
    service: Option<&ServiceEndpoint>,
    page_origin: Option<&str>,
    dev_hostnames: &DevHostnames,
    bypass: bool,
) -> TrustDecision {
    if bypass {
        return TrustDecision::Bypassed;
    }

    let service = match service {
        Some(s) => s,
        None => return TrustDecision::Denied(DenyReason::MissingService),
    };

    let target_origin = target.origin().ascii_serialization();
    let same_origin = target.origin().is_tuple() && target_origin == service.origin();

    let dev_alias = !dev_hostnames.is_empty() && dev_hostnames.contains_origin_of(target) && {
        let page_is_dev = page_origin
            .and_then(|o| Url::parse(o).ok())
            .is_some_and(|o| dev_hostnames.contains_origin_of(&o));
        page_is_dev || dev_hostnames.contains(service.host())
    };

    if !same_origin && !dev_alias {
        tracing::debug!(
            target_origin = %target_origin,
            service_origin = %service.origin(),
            "Denied: origin mismatch"
        );
        return TrustDecision::Denied(DenyReason::OriginMismatch);
    }

    if !service.contains_path(target.path()) {
        tracing::debug!(
            path = %target.path(),
            prefix = %service.path_prefix(),
            "Denied: path outside service prefix"
        );
        return TrustDecision::Denied(DenyReason::PathOutsidePrefix);
    }

    TrustDecision::Allowed
}

/// Page origin and dev aliases bundled for repeated evaluation
#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    page_origin: Option<String>,
    dev_hostnames: DevHostnames,
}

impl TrustPolicy {
    pub fn new(page_origin: Option<String>, dev_hostnames: DevHostnames) -> Self {
        Self {
            page_origin,
            dev_hostnames,
        }
    }

    pub fn page_origin(&self) -> Option<&str> {
        self.page_origin.as_deref()
    }

    pub fn dev_hostnames(&self) -> &DevHostnames {
        &self.dev_hostnames
    }

    pub fn evaluate(
        &self,
        target: &Url,
        service: Option<&ServiceEndpoint>,
        bypass: bool,
    ) -> TrustDecision {
        evaluate(
            target,
            service,
            self.page_origin.as_deref(),
            &self.dev_hostnames,
            bypass,
        )
    }

    /// Evaluate raw strings, failing closed on any parse error
    pub fn evaluate_str(
        &self,
        target: &str,
        service_base_url: Option<&str>,
        bypass: bool,
    ) -> TrustDecision {
        if bypass {
            return TrustDecision::Bypassed;
        }

        let service = match service_base_url.map(ServiceEndpoint::parse) {
            Some(Ok(service)) => service,
            Some(Err(_)) | None => return TrustDecision::Denied(DenyReason::MissingService),
        };

        match Url::parse(target) {
            Ok(target) => self.evaluate(&target, Some(&service), false),
            Err(_) => TrustDecision::Denied(DenyReason::InvalidUrl),
        }
    }
}
