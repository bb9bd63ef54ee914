//! Upstream base URL resolution.
//!
//! The registry is a pure function of configuration: a comma-separated list of
//! mirror base URLs becomes an ordered candidate list whose first entry is the
//! primary. Resolution is cheap and is repeated on every request.

/// Resolves the ordered list of upstream base URLs.
///
/// Entries are trimmed, empty entries and duplicates are dropped, and trailing
/// slashes are stripped. Order is preserved, so the first entry is the primary
/// mirror. An empty result is valid and signals a missing configuration.
#[must_use]
pub fn resolve_upstreams(raw: &str) -> Vec<String> {
    let mut upstreams: Vec<String> = Vec::new();

    for entry in raw.split(',') {
        let base = entry.trim().trim_end_matches('/');
        if base.is_empty() {
            continue;
        }
        if upstreams.iter().any(|existing| existing == base) {
            continue;
        }
        upstreams.push(base.to_string());
    }

    upstreams
}

/// Resolves only the primary upstream, for paths that never rotate mirrors.
#[must_use]
pub fn primary_upstream(raw: &str) -> Option<String> {
    resolve_upstreams(raw).into_iter().next()
}

/// Picks the upstream for a given attempt by simple rotation.
///
/// Returns `None` only when the candidate list is empty.
#[must_use]
pub fn pick_upstream(upstreams: &[String], attempt: usize) -> Option<&str> {
    if upstreams.is_empty() {
        return None;
    }
    upstreams.get(attempt % upstreams.len()).map(String::as_str)
}
