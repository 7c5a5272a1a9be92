//! URL normalization against the recording origin

use std::borrow::Cow;

/// Scheme prefixes that mark a URL as already absolute
const SCHEME_PREFIXES: [&str; 2] = ["http://", "https://"];

/// Check whether a URL carries an HTTP(S) scheme
#[must_use]
pub fn has_scheme(url: &str) -> bool {
    SCHEME_PREFIXES.iter().any(|prefix| {
        url.len() >= prefix.len()
            && url.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    })
}

/// Normalize a URL to its absolute form
///
/// Absolute URLs are returned unchanged. Anything else is treated as
/// relative to `origin` and joined to it with exactly one `/`.
#[must_use]
pub fn normalize_url(candidate: &str, origin: &str) -> String {
    if has_scheme(candidate) {
        return candidate.to_string();
    }

    let origin = origin.trim_end_matches('/');
    let path = candidate.trim_start_matches('/');
    format!("{origin}/{path}")
}

/// Strip scheme and authority from a URL, leaving the path and query
///
/// Relative URLs are returned as given. An empty path becomes `/`.
#[must_use]
pub fn path_and_query(url: &str) -> Cow<'_, str> {
    if !has_scheme(url) {
        return Cow::Borrowed(url);
    }

    let after_scheme = url.find("://").map_or(url, |idx| &url[idx + 3..]);
    match after_scheme.find(['/', '?']) {
        Some(idx) if after_scheme[idx..].starts_with('/') => Cow::Borrowed(&after_scheme[idx..]),
        Some(idx) => Cow::Owned(format!("/{}", &after_scheme[idx..])),
        None => Cow::Borrowed("/"),
    }
}

/// Split the query string of a URL into decoded name/value pairs
///
/// Pairs keep their order of appearance. Undecodable components are kept
/// verbatim.
#[must_use]
pub fn query_pairs(url: &str) -> Vec<(String, String)> {
    let without_fragment = url.split('#').next().unwrap_or_default();
    let Some((_, query)) = without_fragment.split_once('?') else {
        return Vec::new();
    };

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(name), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or(spaced.clone(), |decoded| decoded.into_owned())
}
