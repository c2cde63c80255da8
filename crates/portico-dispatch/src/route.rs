//! Per-route request shape translation

use crate::config::QueryRename;
use crate::resolve::is_absolute_url;

/// Literal path of a request URL, without authority, query or fragment
fn literal_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let url = &url[..end];

    if !is_absolute_url(url) {
        return url;
    }

    let after_authority = match url.find("//") {
        Some(idx) => &url[idx + 2..],
        None => url,
    };
    after_authority
        .find('/')
        .map(|idx| &after_authority[idx..])
        .unwrap_or("/")
}

/// Apply every rename whose route matches the request's literal path.
///
/// Depends only on `url` and `renames`; no state is carried between calls.
pub fn translate_query(url: &str, renames: &[QueryRename], query: &mut [(String, String)]) {
    let path = literal_path(url);

    for rename in renames.iter().filter(|r| r.matches(path)) {
        for (key, _) in query.iter_mut() {
            if *key == rename.from {
                tracing::debug!(
                    route = %rename.route,
                    from = %rename.from,
                    to = %rename.to,
                    "Renamed query key"
                );
                *key = rename.to.clone();
            }
        }
    }
}
