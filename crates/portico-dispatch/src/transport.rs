//! HTTP transport port and its reqwest adapter

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use crate::error::TransportError;
use crate::request::{PreparedRequest, RequestBody, ResponseType};
use crate::response::{HttpResponse, Payload};
use crate::Result;

/// Anything able to put a prepared request on the wire
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<HttpResponse>;
}

#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => {
                let encoded =
                    serde_json::to_vec(&value).map_err(|e| TransportError::Request(e.to_string()))?;
                builder.body(encoded)
            }
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Multipart { content_type, data } => {
                builder.header(CONTENT_TYPE, content_type).body(data)
            }
        };

        tracing::debug!(method = %request.method, url = %request.url, "Sending request");

        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        let headers = response.headers().clone();

        if request.response_type == ResponseType::Raw {
            return Ok(HttpResponse::new(status, url)
                .with_headers(headers)
                .with_raw_body(async move { response.bytes().await.map_err(TransportError::from) }));
        }

        let bytes = response.bytes().await?;
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let payload = Payload::decode(request.response_type, bytes.clone(), &content_type);

        Ok(HttpResponse::new(status, url)
            .with_headers(headers)
            .with_payload(payload)
            .with_raw_bytes(bytes))
    }
}
