//! Title/description duplicate detection. Two records are duplicates when
//! both `title` and `description` are byte-for-byte equal; the first
//! occurrence is the original and every later one is a duplicate.

use std::collections::HashSet;

use tracing::debug;

use super::RemovalBudget;
use crate::types::ResultRecord;

/// Indices of every later occurrence of an already-seen identity, ascending.
fn duplicate_positions(results: &[ResultRecord]) -> Vec<usize> {
    let mut seen = HashSet::with_capacity(results.len());
    results
        .iter()
        .enumerate()
        .filter_map(|(i, r)| (!seen.insert(r.identity())).then_some(i))
        .collect()
}

/// Flags every duplicate with `is_duplicate`, replacing any flag the records
/// arrived with. Returns how many were flagged.
pub fn mark_duplicates(results: &mut [ResultRecord]) -> usize {
    mark_duplicates_on_count(results, RemovalBudget::Unbounded)
}

/// Flags duplicates in order, at most as many as `budget` allows. Stale
/// flags from upstream payloads are cleared first.
pub fn mark_duplicates_on_count(results: &mut [ResultRecord], budget: RemovalBudget) -> usize {
    let positions = duplicate_positions(results);
    let marked = budget.cap(positions.len());
    for record in results.iter_mut() {
        record.is_duplicate = false;
    }
    for &i in &positions[..marked] {
        results[i].is_duplicate = true;
    }
    debug!(found = positions.len(), marked, "marked title/description duplicates");
    marked
}

/// Drops flagged records, at most as many as `budget` allows.
pub fn remove_marked_duplicates(
    results: Vec<ResultRecord>,
    budget: RemovalBudget,
) -> Vec<ResultRecord> {
    let mut removed = 0;
    let kept: Vec<_> = results
        .into_iter()
        .filter(|r| {
            if r.is_duplicate && budget.allows(removed) {
                debug!(title = %r.title, "duplicate removed");
                removed += 1;
                false
            } else {
                true
            }
        })
        .collect();
    debug!(removed, "removed marked duplicates");
    kept
}

pub fn count_duplicates(results: &[ResultRecord]) -> usize {
    duplicate_positions(results).len()
}

/// Removes duplicates in order of appearance, at most as many as `budget`
/// allows. A zero budget returns the input untouched.
pub fn remove_duplicates(results: Vec<ResultRecord>, budget: RemovalBudget) -> Vec<ResultRecord> {
    if budget.is_exhausted() {
        return results;
    }
    let positions = duplicate_positions(&results);
    let removable: HashSet<usize> = positions[..budget.cap(positions.len())]
        .iter()
        .copied()
        .collect();
    let before = results.len();
    let kept: Vec<_> = results
        .into_iter()
        .enumerate()
        .filter_map(|(i, r)| (!removable.contains(&i)).then_some(r))
        .collect();
    debug!(found = positions.len(), removed = before - kept.len(), "removed duplicates");
    kept
}
