//! Credentialed request dispatcher

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use url::Url;

use portico_policy::{PolicyError, ServiceEndpoint, TrustDecision, TrustPolicy};
use portico_storage::CredentialStore;

use crate::config::{BackendConfig, ServiceConfig, ServiceSelection};
use crate::request::{carries_body, ApiRequest, PreparedRequest, RequestBody};
use crate::resolve::resolve_request_url;
use crate::response::HttpResponse;
use crate::route::translate_query;
use crate::transport::HttpTransport;
use crate::Result;

/// Outbound request gate.
///
/// Every call is resolved against the selected backend and evaluated by the
/// trust policy; only an `Allowed` target receives the bearer token.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialStore>,
    backend: Arc<RwLock<BackendConfig>>,
    policy: TrustPolicy,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialStore>,
        backend: BackendConfig,
        policy: TrustPolicy,
    ) -> Self {
        Self {
            transport,
            credentials,
            backend: Arc::new(RwLock::new(backend)),
            policy,
        }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn backend(&self) -> BackendConfig {
        self.backend.read().clone()
    }

    pub fn select_service(&self, selection: ServiceSelection) {
        self.backend.write().selected = selection;
        tracing::info!(service = selection.as_str(), "Selected backend service");
    }

    pub fn selected_service(&self) -> Option<ServiceConfig> {
        self.backend.read().selected_service().cloned()
    }

    /// Endpoint of the selected service, or why there is none
    pub fn service_endpoint(&self) -> std::result::Result<ServiceEndpoint, PolicyError> {
        self.selected_service()
            .ok_or(PolicyError::MissingService)?
            .endpoint()
    }

    /// Resolve `raw` against the selected service base URL
    pub fn resolve_url(&self, raw: &str) -> Option<Url> {
        let base = self
            .selected_service()
            .map(|s| s.base_url)
            .unwrap_or_default();
        resolve_request_url(raw, &base)
    }

    /// Apply routing, credentials and content negotiation to `request`
    pub fn prepare(&self, request: ApiRequest) -> PreparedRequest {
        let ApiRequest {
            method,
            url,
            mut query,
            mut headers,
            body,
            response_type,
        } = request;

        let service = self.selected_service();
        let (base_url, renames) = match &service {
            Some(s) => (s.base_url.as_str(), s.query_renames.as_slice()),
            None => ("", &[][..]),
        };

        translate_query(&url, renames, &mut query);

        let target = resolve_request_url(&url, base_url);
        match &target {
            Some(target) => {
                let endpoint = service.as_ref().and_then(|s| s.endpoint().ok());
                let decision = self.policy.evaluate(target, endpoint.as_ref(), false);
                if decision == TrustDecision::Allowed {
                    self.attach_credentials(&mut headers);
                } else {
                    tracing::debug!(url = %target, decision = ?decision, "Not attaching credentials");
                }
            }
            None => {
                tracing::debug!(url = %url, "Could not resolve request URL; sending without credentials");
            }
        }

        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }

        let body = if carries_body(&method) {
            encode_body(body, &mut headers)
        } else {
            body
        };

        PreparedRequest {
            method,
            url: target.map(|t| t.to_string()).unwrap_or(url),
            query,
            headers,
            body,
            response_type,
        }
    }

    pub async fn dispatch(&self, request: ApiRequest) -> Result<HttpResponse> {
        let prepared = self.prepare(request);
        self.transport.send(prepared).await
    }

    fn attach_credentials(&self, headers: &mut HeaderMap) {
        if headers.contains_key(AUTHORIZATION) {
            return;
        }

        let token = match self.credentials.token() {
            Some(token) => token,
            None => return,
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!("Stored token is not a valid header value; sending without it");
            }
        }
    }
}

/// JSON-encode a structured body when the caller set no content type.
///
/// Encoding failure leaves body and headers untouched.
fn encode_body(body: RequestBody, headers: &mut HeaderMap) -> RequestBody {
    if headers.contains_key(CONTENT_TYPE) || body.is_empty() || body.is_multipart() {
        return body;
    }

    match body {
        RequestBody::Json(value) => match serde_json::to_vec(&value) {
            Ok(encoded) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                RequestBody::Bytes(encoded.into())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode request body as JSON");
                RequestBody::Json(value)
            }
        },
        other => other,
    }
}
