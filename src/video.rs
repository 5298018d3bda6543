use url::Url;

/// Extract the `v` query parameter from a video link.
///
/// Returns `None` for links that are not absolute http(s) URLs or that have no
/// non-empty `v` parameter. The value is percent-decoded.
pub fn video_id(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Embed URL used for the in-app video preview.
pub fn embed_url(link: &str) -> Option<String> {
    video_id(link).map(|id| format!("https://www.youtube.com/embed/{id}"))
}
