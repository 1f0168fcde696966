use url::Url;

const TRACKING_PREFIXES: [&str; 5] = ["utm_", "fbclid", "gclid", "ref_", "yclid"];
const TRACKING_KEYS: [&str; 2] = ["ref", "source"];

pub fn is_tracking_param(key: &str) -> bool {
    TRACKING_PREFIXES.iter().any(|p| key.starts_with(p)) || TRACKING_KEYS.contains(&key)
}

/// Strip tracking query parameters so search grounding sees the canonical page.
///
/// Keeps origin, path and the remaining parameters in order; drops user-info
/// and fragment. Input that does not parse as a URL is returned unchanged.
pub fn clean_url_for_search(raw: &str) -> String {
    let Ok(url) = Url::parse(raw.trim()) else {
        return raw.to_string();
    };
    // opaque URLs (mailto:, data:) have no origin worth rebuilding
    if url.cannot_be_a_base() {
        return raw.to_string();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut clean = url.clone();
    clean.set_fragment(None);
    // user-info is not part of the origin
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    if kept.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(kept);
    }
    clean.to_string()
}
