use crate::config::ComponentsConfig;
use crate::request::QueryParams;

use super::is_deduplication_enabled;

/// Number of esqs results to request upstream so that the caller's `nr` is
/// still met after duplicates are removed. Returns `nr` unchanged when
/// deduplication is off or no extra percentage is configured.
pub fn increase_fetch_results(config: &ComponentsConfig, query: &QueryParams) -> usize {
    let nr = query.nr;
    if !is_deduplication_enabled(&config.deduplication, query) {
        return nr;
    }
    let percentage = config.deduplication.esqs.additional_fetch_percentage;
    if percentage > 0.0 {
        let additional = (nr as f64 * percentage / 100.0).ceil() as usize;
        return nr + additional;
    }
    nr
}
