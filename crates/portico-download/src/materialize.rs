//! Resource materialization
//!
//! Normalizes whatever the transport handed back into one binary blob.
//! Extraction is an ordered chain; the first extractor producing a
//! non-empty blob wins:
//!
//! 1. pre-parsed blob
//! 2. byte buffer
//! 3. text
//! 4. structured JSON value
//! 5. lazy byte accessor
//! 6. raw response body

use bytes::Bytes;

use portico_dispatch::{Blob, HttpResponse, Payload};

use crate::error::DownloadError;
use crate::Result;

/// Binary payload ready for classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedResource {
    pub bytes: Bytes,
    /// Declared MIME type, possibly empty
    pub mime_type: String,
}

impl MaterializedResource {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Blob> for MaterializedResource {
    fn from(blob: Blob) -> Self {
        Self {
            bytes: blob.bytes,
            mime_type: blob.mime,
        }
    }
}

/// Synchronous extractor over the pre-parsed payload.
///
/// Receives the payload and the response's declared content type.
pub type Extractor = fn(&Payload, &str) -> Option<Blob>;

/// Pure extractors in the order they are tried
pub const EXTRACTORS: &[(&str, Extractor)] = &[
    ("blob", from_blob as Extractor),
    ("buffer", from_buffer as Extractor),
    ("text", from_text as Extractor),
    ("json", from_json as Extractor),
];

fn from_blob(payload: &Payload, _content_type: &str) -> Option<Blob> {
    match payload {
        Payload::Blob(blob) => Some(blob.clone()),
        _ => None,
    }
}

fn from_buffer(payload: &Payload, content_type: &str) -> Option<Blob> {
    match payload {
        Payload::Buffer(bytes) => Some(Blob::new(bytes.clone(), content_type)),
        _ => None,
    }
}

fn from_text(payload: &Payload, _content_type: &str) -> Option<Blob> {
    match payload {
        Payload::Text(text) => Some(Blob::new(Bytes::from(text.clone()), "")),
        _ => None,
    }
}

fn from_json(payload: &Payload, _content_type: &str) -> Option<Blob> {
    let value = match payload {
        Payload::Json(value) => value,
        _ => return None,
    };

    match serde_json::to_vec(value) {
        Ok(encoded) => Some(Blob::new(encoded, "application/json")),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize JSON payload");
            None
        }
    }
}

/// Materialize `response` into a non-empty resource.
///
/// A zero-byte result at every stage yields `EmptyResource`.
pub async fn materialize(response: &mut HttpResponse) -> Result<MaterializedResource> {
    let content_type = response.content_type().to_string();

    for (name, extract) in EXTRACTORS {
        if let Some(blob) = extract(&response.payload, &content_type) {
            if !blob.is_empty() {
                tracing::debug!(extractor = name, bytes = blob.len(), "Materialized resource");
                return Ok(blob.into());
            }
        }
    }

    if let Some(reader) = response.take_lazy_bytes() {
        match reader.await {
            Ok(bytes) if !bytes.is_empty() => {
                tracing::debug!(extractor = "lazy", bytes = bytes.len(), "Materialized resource");
                return Ok(MaterializedResource::new(bytes, content_type));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Lazy byte accessor failed; reading raw body");
            }
        }
    }

    let bytes = match response.take_raw_body() {
        Some(reader) => reader.await?,
        None => Bytes::new(),
    };

    if bytes.is_empty() {
        return Err(DownloadError::EmptyResource);
    }

    tracing::debug!(extractor = "raw", bytes = bytes.len(), "Materialized resource");
    Ok(MaterializedResource::new(bytes, content_type))
}
