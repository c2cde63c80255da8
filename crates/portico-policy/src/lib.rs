//! Portico Trust Policy
//!
//! Decides whether an outbound request targets "the same service" as a
//! configured backend before any credential is attached to it:
//! - Explicit bypass skips every check
//! - Same origin, or loopback aliasing in development builds
//! - Path containment below the service prefix, on a segment boundary
//!
//! Every parse failure is treated as a denial.

mod endpoint;
mod error;
mod origin;

pub use endpoint::ServiceEndpoint;
pub use error::PolicyError;
pub use origin::{evaluate, DenyReason, DevHostnames, TrustDecision, TrustPolicy, LOOPBACK_ALIASES};

pub type Result<T> = std::result::Result<T, PolicyError>;
