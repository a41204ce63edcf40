//! Cache fingerprints for fetch requests.

use crate::platform::Platform;

/// Canonical form of a content URL used for cache keys.
///
/// Trims whitespace, drops the fragment, treats `http` and `https` (or a
/// missing scheme) as `https`, lowercases the host and strips a leading
/// `www.` or `m.`, and removes a trailing `/` from the path. The query string
/// is kept verbatim because it carries identifiers such as `?v=`.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_fragment = trimmed.split_once('#').map_or(trimmed, |(head, _)| head);

    let rest = match without_fragment.split_once("://") {
        Some((scheme, rest))
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") =>
        {
            rest
        }
        Some(_) => return without_fragment.to_string(),
        None => without_fragment,
    };

    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let host = authority.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(&host);

    let (path, query) = match tail.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (tail, None),
    };
    let path = path.trim_end_matches('/');

    match query {
        Some(q) if !q.is_empty() => format!("https://{host}{path}?{q}"),
        _ => format!("https://{host}{path}"),
    }
}

/// Cache key for a fetch request: `platform:normalized_url`.
#[must_use]
pub fn fingerprint(platform: Platform, url: &str) -> String {
    format!("{}:{}", platform.as_str(), normalize_url(url))
}
