//! Sidekick state persistence backends

use async_trait::async_trait;

use portico_dispatch::{ApiRequest, Dispatcher, ResponseType, StatusCode};

use crate::error::SidekickError;
use crate::state::{SidekickKey, SidekickState};
use crate::Result;

/// Route of the sidekick state resource, relative to the selected service
pub const SIDEKICK_STATE_ROUTE: &str = "sidekick/state";

#[async_trait]
pub trait SidekickBackend: Send + Sync {
    /// Fetch the stored state; `None` when nothing was saved yet
    async fn load(&self, key: &SidekickKey) -> Result<Option<SidekickState>>;

    async fn save(&self, key: &SidekickKey, state: &SidekickState) -> Result<()>;
}

/// Backend that talks to the selected service through the dispatcher,
/// so requests carry credentials under the usual trust policy.
#[derive(Clone)]
pub struct HttpSidekickBackend {
    dispatcher: Dispatcher,
}

impl HttpSidekickBackend {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    fn request(&self, request: ApiRequest, key: &SidekickKey) -> ApiRequest {
        key.query()
            .into_iter()
            .fold(request, |request, (name, value)| request.query(name, value))
    }
}

#[async_trait]
impl SidekickBackend for HttpSidekickBackend {
    async fn load(&self, key: &SidekickKey) -> Result<Option<SidekickState>> {
        // Bytes keeps the body untouched; JSON decoding would unwrap string states
        let request = self
            .request(ApiRequest::get(SIDEKICK_STATE_ROUTE), key)
            .response_type(ResponseType::Bytes);
        let response = self.dispatcher.dispatch(request).await?;

        match response.status {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => return Ok(None),
            status if !status.is_success() => return Err(SidekickError::Upstream(status)),
            _ => {}
        }

        let body = response.into_bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| SidekickError::InvalidState(e.to_string()))?;

        if value.is_null() {
            return Ok(None);
        }

        tracing::debug!(key = %key, "Loaded sidekick state");
        Ok(Some(SidekickState::new(value)))
    }

    async fn save(&self, key: &SidekickKey, state: &SidekickState) -> Result<()> {
        let request = self.request(
            ApiRequest::put(SIDEKICK_STATE_ROUTE).json(state.as_value().clone()),
            key,
        );
        let response = self.dispatcher.dispatch(request).await?;

        if !response.is_success() {
            return Err(SidekickError::Upstream(response.status));
        }

        tracing::debug!(key = %key, "Saved sidekick state");
        Ok(())
    }
}
