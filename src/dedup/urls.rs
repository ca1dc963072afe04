use std::collections::HashSet;

use tracing::debug;

use super::RemovalBudget;
use crate::types::ResultRecord;

/// Flags every repeated `url` with `is_duplicate_url`; the first occurrence
/// stays unflagged and incoming flags are replaced. Returns how many were
/// flagged.
pub fn mark_duplicate_urls(results: &mut [ResultRecord]) -> usize {
    let positions: Vec<usize> = {
        let mut seen = HashSet::with_capacity(results.len());
        results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| (!seen.insert(r.url.as_str())).then_some(i))
            .collect()
    };
    for (i, record) in results.iter_mut().enumerate() {
        record.is_duplicate_url = positions.binary_search(&i).is_ok();
    }
    positions.len()
}

/// Number of URL-flagged records in `[0, split)`.
pub fn url_duplicates_before(results: &[ResultRecord], split: usize) -> usize {
    results
        .iter()
        .take(split)
        .filter(|r| r.is_duplicate_url)
        .count()
}

/// Removes URL-flagged records from the primary window `[0, split)` only,
/// earliest first, up to the budget. The overflow window is returned as is.
/// Returns the kept records and how many were removed.
pub fn remove_url_duplicates(
    results: Vec<ResultRecord>,
    split: usize,
    budget: RemovalBudget,
) -> (Vec<ResultRecord>, usize) {
    let limit = budget.cap(url_duplicates_before(&results, split));
    let mut removed = 0;
    let kept: Vec<_> = results
        .into_iter()
        .enumerate()
        .filter_map(|(i, r)| {
            if i < split && r.is_duplicate_url && removed < limit {
                debug!(url = %r.url, "url duplicate removed");
                removed += 1;
                None
            } else {
                Some(r)
            }
        })
        .collect();
    (kept, removed)
}
