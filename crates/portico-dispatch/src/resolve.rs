//! Request URL resolution

use url::Url;

/// Whether `input` carries its own scheme (`https://...`) or is
/// protocol-relative (`//host/...`).
pub fn is_absolute_url(input: &str) -> bool {
    if input.starts_with("//") {
        return true;
    }

    match input.find("://") {
        Some(0) | None => false,
        Some(idx) => {
            let scheme = &input[..idx];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
    }
}

/// Resolve a request URL to absolute form.
///
/// Absolute URLs are used as they are, protocol-relative URLs take the base
/// scheme, and relative URLs are appended to the base URL path. Returns
/// `None` if nothing parseable comes out.
pub fn resolve_request_url(raw: &str, base_url: &str) -> Option<Url> {
    let raw = raw.trim();

    if let Some(rest) = raw.strip_prefix("//") {
        let scheme = Url::parse(base_url.trim())
            .map(|b| b.scheme().to_string())
            .ok()?;
        return Url::parse(&format!("{}://{}", scheme, rest)).ok();
    }

    if is_absolute_url(raw) {
        return Url::parse(raw).ok();
    }

    let base = base_url.trim();
    if base.is_empty() {
        return None;
    }

    Url::parse(&combine(base, raw)).ok()
}

fn combine(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }

    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
