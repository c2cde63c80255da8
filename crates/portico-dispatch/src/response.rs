//! Response model
//!
//! A response carries whatever the transport already parsed (`Payload`),
//! plus up to two deferred readers: a lazy byte accessor and the raw body.

use bytes::Bytes;
use futures_util::future::{self, BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::error::TransportError;
use crate::request::ResponseType;

pub type BodyFuture = BoxFuture<'static, Result<Bytes, TransportError>>;

/// Binary data with a (possibly empty) MIME type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Bytes,
    pub mime: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Response body as pre-parsed by the transport
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    #[default]
    None,
    Blob(Blob),
    Buffer(Bytes),
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    /// Expose `bytes` the way `response_type` asks for
    pub fn decode(response_type: ResponseType, bytes: Bytes, content_type: &str) -> Self {
        match response_type {
            ResponseType::Raw => Payload::None,
            ResponseType::Blob => Payload::Blob(Blob::new(bytes, content_type)),
            ResponseType::Bytes => Payload::Buffer(bytes),
            ResponseType::Text => Payload::Text(String::from_utf8_lossy(&bytes).into_owned()),
            ResponseType::Json => {
                if bytes.is_empty() {
                    return Payload::None;
                }
                match serde_json::from_slice::<serde_json::Value>(&bytes) {
                    Ok(serde_json::Value::String(s)) => Payload::Text(s),
                    Ok(value) => Payload::Json(value),
                    Err(_) => Payload::Text(String::from_utf8_lossy(&bytes).into_owned()),
                }
            }
        }
    }
}

pub struct HttpResponse {
    pub status: StatusCode,
    /// Final URL after redirects
    pub url: String,
    pub headers: HeaderMap,
    pub payload: Payload,
    lazy_bytes: Option<BodyFuture>,
    raw_body: Option<BodyFuture>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HeaderMap::new(),
            payload: Payload::None,
            lazy_bytes: None,
            raw_body: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a deferred byte accessor
    pub fn with_lazy_bytes<F>(mut self, reader: F) -> Self
    where
        F: std::future::Future<Output = Result<Bytes, TransportError>> + Send + 'static,
    {
        self.lazy_bytes = Some(reader.boxed());
        self
    }

    /// Attach the raw body reader
    pub fn with_raw_body<F>(mut self, reader: F) -> Self
    where
        F: std::future::Future<Output = Result<Bytes, TransportError>> + Send + 'static,
    {
        self.raw_body = Some(reader.boxed());
        self
    }

    /// Raw body already in memory
    pub fn with_raw_bytes(self, bytes: Bytes) -> Self {
        self.with_raw_body(future::ready(Ok(bytes)))
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Declared content type, empty if absent or not valid text
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    pub fn take_lazy_bytes(&mut self) -> Option<BodyFuture> {
        self.lazy_bytes.take()
    }

    pub fn take_raw_body(&mut self) -> Option<BodyFuture> {
        self.raw_body.take()
    }

    /// Consume the response into bytes, preferring the parsed payload
    pub async fn into_bytes(mut self) -> Result<Bytes, TransportError> {
        match std::mem::take(&mut self.payload) {
            Payload::Blob(blob) => return Ok(blob.bytes),
            Payload::Buffer(bytes) => return Ok(bytes),
            Payload::Text(text) => return Ok(Bytes::from(text)),
            Payload::Json(value) => {
                return serde_json::to_vec(&value)
                    .map(Bytes::from)
                    .map_err(|e| TransportError::Body(e.to_string()))
            }
            Payload::None => {}
        }

        if let Some(reader) = self.lazy_bytes.take() {
            return reader.await;
        }
        match self.raw_body.take() {
            Some(reader) => reader.await,
            None => Ok(Bytes::new()),
        }
    }

    /// Consume the response into parsed JSON
    pub async fn into_json(self) -> Result<serde_json::Value, TransportError> {
        if let Payload::Json(value) = &self.payload {
            return Ok(value.clone());
        }

        let bytes = self.into_bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Body(e.to_string()))
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("payload", &self.payload)
            .field("lazy_bytes", &self.lazy_bytes.is_some())
            .field("raw_body", &self.raw_body.is_some())
            .finish()
    }
}
