//! Validated resource download
//!
//! The public entry point: resolve, validate, fetch, materialize, classify,
//! deliver. Every outcome, success or failure, ends in a notification.

use std::sync::Arc;
use url::Url;

use portico_dispatch::header::{HeaderValue, ACCEPT};
use portico_dispatch::{is_absolute_url, ApiRequest, Dispatcher, ResponseType};
use portico_policy::TrustDecision;

use crate::classify::{classify, DeliveryDecision};
use crate::error::DownloadError;
use crate::lifecycle::LifecycleManager;
use crate::materialize::materialize;
use crate::notify::Notifier;
use crate::platform::DeliveryPlatform;
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Skip the origin/path check. Credentials still follow the dispatcher's
    /// own policy.
    pub bypass_trust: bool,
}

impl DownloadOptions {
    pub fn bypass() -> Self {
        Self { bypass_trust: true }
    }
}

#[derive(Clone)]
pub struct Downloader {
    dispatcher: Dispatcher,
    lifecycle: LifecycleManager,
}

impl Downloader {
    pub fn new(
        dispatcher: Dispatcher,
        platform: Arc<dyn DeliveryPlatform>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            dispatcher,
            lifecycle: LifecycleManager::new(platform, notifier),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Fetch `url` and hand it to the user.
    ///
    /// Failures are reported through the notifier before being returned.
    pub async fn download(&self, url: &str, options: DownloadOptions) -> Result<DeliveryDecision> {
        let outcome = self.fetch_and_deliver(url, options).await;

        match &outcome {
            Ok(decision) => tracing::info!(
                mode = decision.mode.as_str(),
                filename = %decision.filename,
                "Download complete"
            ),
            Err(e) => tracing::warn!(error = %e, "Download failed"),
        }

        self.lifecycle.report(&outcome);
        outcome
    }

    async fn fetch_and_deliver(&self, url: &str, options: DownloadOptions) -> Result<DeliveryDecision> {
        let target = self.resolve_target(url)?;

        if !options.bypass_trust {
            self.check_trust(&target)?;
        } else {
            tracing::debug!(url = %target, "Trust check bypassed");
        }

        let request = ApiRequest::get(target.as_str())
            .header(ACCEPT, HeaderValue::from_static("*/*"))
            .response_type(ResponseType::Blob);

        let mut response = self.dispatcher.dispatch(request).await?;
        if !response.is_success() {
            return Err(DownloadError::Upstream(response.status));
        }

        let resource = materialize(&mut response).await?;
        let decision = classify(&resource, &response.url, target.as_str());
        self.lifecycle.deliver(&resource, &decision)?;

        Ok(decision)
    }

    fn resolve_target(&self, raw: &str) -> Result<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DownloadError::InvalidUrl("empty URL".to_string()));
        }

        if is_absolute_url(raw) && !raw.starts_with("//") {
            return Url::parse(raw).map_err(|e| DownloadError::InvalidUrl(e.to_string()));
        }

        // Relative and protocol-relative URLs need a usable service base
        self.dispatcher
            .service_endpoint()
            .map_err(|e| DownloadError::Configuration(e.to_string()))?;

        self.dispatcher
            .resolve_url(raw)
            .ok_or_else(|| DownloadError::InvalidUrl(raw.to_string()))
    }

    fn check_trust(&self, target: &Url) -> Result<()> {
        let endpoint = self
            .dispatcher
            .service_endpoint()
            .map_err(|e| DownloadError::Configuration(e.to_string()))?;

        match self.dispatcher.policy().evaluate(target, Some(&endpoint), false) {
            TrustDecision::Denied(reason) => {
                tracing::warn!(url = %target, reason = reason.as_str(), "Download blocked by trust policy");
                Err(DownloadError::PolicyDenied(reason))
            }
            TrustDecision::Allowed | TrustDecision::Bypassed => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::DeliveryMode;
    use crate::lifecycle::tests::{FakePlatform, RecordingNotifier};
    use crate::lifecycle::{DOWNLOAD_STARTED_MESSAGE, OPENED_MESSAGE, REVOKE_AFTER};
    use crate::notify::NotificationKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use portico_dispatch::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
    use portico_dispatch::{
        BackendConfig, Blob, HttpResponse, HttpTransport, Payload, PreparedRequest, ServiceConfig,
        StatusCode, TransportError,
    };
    use portico_policy::{DenyReason, DevHostnames, TrustPolicy};
    use portico_storage::MemoryCredentials;
    use std::time::Duration;

    type Responder = Box<dyn Fn(&PreparedRequest) -> portico_dispatch::Result<HttpResponse> + Send + Sync>;

    struct ScriptedTransport {
        sent: Mutex<Vec<PreparedRequest>>,
        respond: Responder,
    }

    impl ScriptedTransport {
        fn new(respond: Responder) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                respond,
            }
        }

        fn sent(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: PreparedRequest) -> portico_dispatch::Result<HttpResponse> {
            let response = (self.respond)(&request);
            self.sent.lock().push(request);
            response
        }
    }

    fn blob_response(url: &str, mime: &'static str, body: &'static [u8]) -> HttpResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime));
        HttpResponse::new(StatusCode::OK, url)
            .with_headers(headers)
            .with_payload(Payload::Blob(Blob::new(body, mime)))
    }

    struct Harness {
        downloader: Downloader,
        transport: Arc<ScriptedTransport>,
        platform: Arc<FakePlatform>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(backend: BackendConfig, respond: Responder) -> Harness {
        let transport = Arc::new(ScriptedTransport::new(respond));
        let platform = Arc::new(FakePlatform::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let dispatcher = Dispatcher::new(
            transport.clone(),
            Arc::new(MemoryCredentials::new(Some("T".to_string()))),
            backend,
            TrustPolicy::new(None, DevHostnames::none()),
        );

        Harness {
            downloader: Downloader::new(dispatcher, platform.clone(), notifier.clone()),
            transport,
            platform,
            notifier,
        }
    }

    fn files_backend() -> BackendConfig {
        BackendConfig::new(ServiceConfig::new("https://svc.example/files"))
    }

    fn echo_blob(mime: &'static str, body: &'static [u8]) -> Responder {
        Box::new(move |request| Ok(blob_response(&request.url, mime, body)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_proxy_download_saved_with_credentials() {
        let h = harness(
            files_backend(),
            echo_blob("application/octet-stream", b"0123456789"),
        );

        let decision = h
            .downloader
            .download("https://svc.example/files/abc/proxy-download", DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(decision.mode, DeliveryMode::Download);
        assert_eq!(decision.filename, "abc");

        let sent = h.transport.sent.lock();
        assert_eq!(
            sent[0].headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer T")
        );
        assert_eq!(
            sent[0].headers.get(ACCEPT).and_then(|v| v.to_str().ok()),
            Some("*/*")
        );
        assert_eq!(sent[0].response_type, ResponseType::Blob);
        drop(sent);

        assert_eq!(
            h.platform.anchor(1).and_then(|a| a.download),
            Some("abc".to_string())
        );
        assert_eq!(
            h.notifier.messages(),
            vec![(NotificationKind::Success, DOWNLOAD_STARTED_MESSAGE.to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewable_resource_opens_inline() {
        let h = harness(files_backend(), echo_blob("application/pdf", b"%PDF-1.7"));

        let decision = h
            .downloader
            .download("https://svc.example/files/report.pdf", DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(decision.mode, DeliveryMode::Inline);
        assert_eq!(
            h.notifier.messages(),
            vec![(NotificationKind::Success, OPENED_MESSAGE.to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_relative_url_resolved_against_service() {
        let h = harness(files_backend(), echo_blob("text/csv", b"a,b"));

        let decision = h
            .downloader
            .download("export/data.csv", DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(decision.filename, "data.csv");
        assert_eq!(
            h.transport.sent.lock()[0].url,
            "https://svc.example/files/export/data.csv"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_origin_denied_without_fetch() {
        let h = harness(files_backend(), echo_blob("image/png", b"png"));

        let result = h
            .downloader
            .download("https://evil.example/x.png", DownloadOptions::default())
            .await;

        assert_eq!(result, Err(DownloadError::PolicyDenied(DenyReason::OriginMismatch)));
        assert_eq!(h.transport.sent(), 0);
        assert!(h.platform.calls().is_empty());

        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, NotificationKind::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_outside_prefix_denied() {
        let h = harness(files_backend(), echo_blob("image/png", b"png"));

        let result = h
            .downloader
            .download("https://svc.example/admin/x.png", DownloadOptions::default())
            .await;

        assert_eq!(result, Err(DownloadError::PolicyDenied(DenyReason::PathOutsidePrefix)));
        assert_eq!(h.transport.sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bypass_fetches_without_credentials() {
        let h = harness(files_backend(), echo_blob("image/png", b"png"));

        let decision = h
            .downloader
            .download("https://cdn.other/img.png", DownloadOptions::bypass())
            .await
            .unwrap();

        assert_eq!(decision.mode, DeliveryMode::Inline);
        assert!(!h.transport.sent.lock()[0].headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_service_is_configuration_error() {
        let backend = BackendConfig::new(ServiceConfig::new(""));
        let h = harness(backend, echo_blob("image/png", b"png"));

        let absolute = h
            .downloader
            .download("https://svc.example/files/a.png", DownloadOptions::default())
            .await;
        assert!(matches!(absolute, Err(DownloadError::Configuration(_))));

        let relative = h
            .downloader
            .download("a.png", DownloadOptions::default())
            .await;
        assert!(matches!(relative, Err(DownloadError::Configuration(_))));
        assert_eq!(h.transport.sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_url() {
        let h = harness(files_backend(), echo_blob("image/png", b"png"));

        let result = h
            .downloader
            .download("https://", DownloadOptions::default())
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl(_))));

        let result = h.downloader.download("   ", DownloadOptions::default()).await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_and_transport_failures() {
        let h = harness(
            files_backend(),
            Box::new(|request| {
                if request.url.ends_with("missing.bin") {
                    Ok(HttpResponse::new(StatusCode::NOT_FOUND, request.url.clone()))
                } else {
                    Err(TransportError::Timeout)
                }
            }),
        );

        let result = h
            .downloader
            .download("https://svc.example/files/missing.bin", DownloadOptions::default())
            .await;
        assert_eq!(result, Err(DownloadError::Upstream(StatusCode::NOT_FOUND)));

        let result = h
            .downloader
            .download("https://svc.example/files/slow.bin", DownloadOptions::default())
            .await;
        assert_eq!(result, Err(DownloadError::Transport(TransportError::Timeout)));

        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 2);
        assert_ne!(messages[0].1, messages[1].1);
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_resource_never_delivered() {
        let h = harness(
            files_backend(),
            Box::new(|request| {
                Ok(HttpResponse::new(StatusCode::OK, request.url.clone())
                    .with_payload(Payload::Blob(Blob::new(&b""[..], "application/pdf"))))
            }),
        );

        let result = h
            .downloader
            .download("https://svc.example/files/empty.pdf", DownloadOptions::default())
            .await;

        assert_eq!(result, Err(DownloadError::EmptyResource));
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_revoked_after_delivery() {
        let h = harness(files_backend(), echo_blob("application/zip", b"PK"));

        h.downloader
            .download("https://svc.example/files/a.zip", DownloadOptions::default())
            .await
            .unwrap();
        assert!(!h.platform.calls().iter().any(|c| c.starts_with("revoke")));

        tokio::time::sleep(REVOKE_AFTER + Duration::from_millis(1)).await;
        assert!(h.platform.calls().iter().any(|c| c.starts_with("revoke")));
    }
}
