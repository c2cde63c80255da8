//! Delivery classification and filename derivation

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::materialize::MaterializedResource;

/// Path suffix the file service appends to proxied downloads
pub const PROXY_DOWNLOAD_SUFFIX: &str = "/proxy-download";

/// Longest filename handed to the platform, extension included
pub const MAX_FILENAME_LEN: usize = 200;

pub const DEFAULT_FILENAME: &str = "download";

/// Longest extension preserved when truncating
const MAX_EXTENSION_LEN: usize = 8;

const INLINE_MIME_PREFIXES: &[&str] = &["image/", "text/", "video/", "audio/"];

const INLINE_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/json",
    "image/svg+xml",
    "text/html",
];

const INLINE_EXTENSIONS: &[&str] = &["svg", "html", "htm", "json", "txt", "csv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Open in a new viewing context
    Inline,
    /// Save to disk
    Download,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Inline => "inline",
            DeliveryMode::Download => "download",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDecision {
    pub mode: DeliveryMode,
    /// Sanitized, at most `MAX_FILENAME_LEN` characters
    pub filename: String,
}

/// Decide how to deliver `resource` and under which name.
pub fn classify(
    resource: &MaterializedResource,
    response_url: &str,
    target_url: &str,
) -> DeliveryDecision {
    let filename = derive_filename(response_url, target_url);
    let mode = if is_viewable(&resource.mime_type, &filename) {
        DeliveryMode::Inline
    } else {
        DeliveryMode::Download
    };

    DeliveryDecision { mode, filename }
}

/// Derive a safe filename from the response URL, falling back to the
/// requested URL when the response URL does not parse.
pub fn derive_filename(response_url: &str, target_url: &str) -> String {
    let url = match Url::parse(response_url).or_else(|_| Url::parse(target_url)) {
        Ok(url) => url,
        Err(_) => return DEFAULT_FILENAME.to_string(),
    };

    let candidate = match candidate_from_path(url.path()) {
        Some(c) => c,
        None => return DEFAULT_FILENAME.to_string(),
    };

    let decoded = match percent_decode_str(candidate).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => candidate.to_string(),
    };

    let sanitized = sanitize_filename(&decoded);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return DEFAULT_FILENAME.to_string();
    }

    clamp_filename(&sanitized)
}

/// Last path segment, after stripping the proxy-download suffix
fn candidate_from_path(path: &str) -> Option<&str> {
    let path = path.strip_suffix(PROXY_DOWNLOAD_SUFFIX).unwrap_or(path);
    path.rsplit('/').next().filter(|segment| !segment.is_empty())
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Idempotent: sanitizing twice gives the same result.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Truncate to `MAX_FILENAME_LEN`, keeping a short alphanumeric extension.
pub fn clamp_filename(name: &str) -> String {
    if name.chars().count() <= MAX_FILENAME_LEN {
        return name.to_string();
    }

    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match extension {
        Some(ext) => {
            let stem_len = MAX_FILENAME_LEN - ext.len() - 1;
            format!("{}.{}", truncate_chars(name, stem_len), ext)
        }
        None => truncate_chars(name, MAX_FILENAME_LEN).to_string(),
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Whether a resource can be shown directly instead of saved.
///
/// MIME type and filename extension are each sufficient on their own.
pub fn is_viewable(mime_type: &str, filename: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let mime_ok = !essence.is_empty()
        && (INLINE_MIME_PREFIXES.iter().any(|p| essence.starts_with(p))
            || INLINE_MIME_TYPES.contains(&essence.as_str()));

    let extension_ok = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| INLINE_EXTENSIONS.contains(&ext.as_str()));

    mime_ok || extension_ok
}
