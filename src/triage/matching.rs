use similar::TextDiff;

use crate::config::UpstreamService;

/// Similarity of two strings in `[0, 1]`, from a character-level diff.
pub(crate) fn similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio()
}

/// Resolves the registry entry that issued `url`: the first service whose
/// configured URL is contained in it, otherwise the most similar one.
/// Returns `None` only for an empty registry.
pub(crate) fn resolve_service<'a>(
    url: &str,
    registry: &'a [UpstreamService],
) -> Option<&'a UpstreamService> {
    if let Some(exact) = registry.iter().find(|s| url.contains(s.url.as_str())) {
        return Some(exact);
    }

    let mut best: Option<(&UpstreamService, f32)> = None;
    for service in registry {
        let rating = similarity(url, &service.url);
        if best.is_none_or(|(_, top)| rating > top) {
            best = Some((service, rating));
        }
    }
    best.map(|(service, _)| service)
}
