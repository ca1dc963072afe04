//! Deduplication engine.
//!
//! Runs once per request over the triaged result sets, in three passes:
//!
//! 1. knowledge-center entries repeated in the esqs supplemental slice are dropped
//! 2. repeated URLs are dropped from the esqs primary page window
//! 3. repeated title/description pairs are dropped from esqs
//!
//! Passes 2 and 3 share one [`RemovalBudget`] built from the configured cap.
//! Every pass rewrites `count` and the `extra*` counters so the paginator can
//! work out offsets without looking at individual records.

mod amplify;
mod budget;
mod cross_source;
mod identity;
mod stats;
mod urls;

pub use amplify::increase_fetch_results;
pub use budget::RemovalBudget;
pub use cross_source::{CrossSourceOutcome, interleave_count, suppress_cross_source};
pub use identity::{
    count_duplicates, mark_duplicates, mark_duplicates_on_count, remove_duplicates,
    remove_marked_duplicates,
};
pub use stats::{DuplicateStat, duplicate_stats, duplicate_stats_table};
pub use urls::{mark_duplicate_urls, remove_url_duplicates, url_duplicates_before};

use tracing::{debug, info, warn};

use crate::config::{ComponentsConfig, DeduplicationConfig};
use crate::request::{QueryParams, RequestContext};
use crate::types::{ResultRecord, Service, TriagedData};

const GROUPING_TITLE_SNIPPET: &str = "title_snippet";

/// Knowledge center goes first: its pass reads the esqs supplemental slice
/// before esqs is deduplicated.
const PASS_ORDER: [Service; 3] = [Service::KnowledgeCenter, Service::Esqs, Service::Catalog];

/// Per-page allotment of each service on the interleaved page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultCounts {
    pub esqs: usize,
    pub knowledge_center: usize,
}

impl DefaultCounts {
    pub fn resolve(config: &ComponentsConfig, query: &QueryParams) -> Self {
        let knowledge_center = config.pagination.knowledge_center;
        Self {
            esqs: query.nr.saturating_sub(knowledge_center),
            knowledge_center,
        }
    }
}

/// Enabled in config and not switched off by `disableGrouping=title_snippet`.
pub fn is_deduplication_enabled(config: &DeduplicationConfig, query: &QueryParams) -> bool {
    let grouping_disabled = query.disable_grouping.as_deref() == Some(GROUPING_TITLE_SNIPPET);
    config.esqs.enabled && !grouping_disabled
}

/// Returns a deduplicated copy of `triaged`; the input is left untouched.
pub fn deduplicate(
    triaged: &TriagedData,
    config: &ComponentsConfig,
    request: &RequestContext,
) -> TriagedData {
    let defaults = DefaultCounts::resolve(config, &request.query);
    let kc_available = triaged
        .get(Service::KnowledgeCenter)
        .map_or(0, |kc| kc.count);
    let mut deduplicated = triaged.clone();

    for service in PASS_ORDER {
        if triaged.get(service).is_none() {
            continue;
        }
        match service {
            Service::KnowledgeCenter => {
                if request.query.supplemental_enabled() {
                    suppress_knowledge_center(&mut deduplicated, defaults, request);
                }
            }
            Service::Esqs => {
                if is_deduplication_enabled(&config.deduplication, &request.query) {
                    let budget = RemovalBudget::from_count(config.deduplication.esqs.count);
                    deduplicate_esqs(&mut deduplicated, budget, defaults, kc_available, request);
                }
            }
            Service::Catalog => {}
        }
    }
    deduplicated
}

fn suppress_knowledge_center(data: &mut TriagedData, defaults: DefaultCounts, request: &RequestContext) {
    let Some(esqs) = data.get(Service::Esqs) else {
        return;
    };
    if esqs.sm_count == 0 {
        return;
    }
    let sm_slice: Vec<ResultRecord> = esqs.results.iter().take(esqs.sm_count).cloned().collect();
    let interleave = interleave_count(esqs.results.len(), defaults);

    let Some(kc) = data.get_mut(Service::KnowledgeCenter) else {
        return;
    };
    let outcome = suppress_cross_source(&sm_slice, &mut kc.results, interleave);
    kc.results = remove_marked_duplicates(std::mem::take(&mut kc.results), RemovalBudget::Unbounded);
    kc.count = kc.results.len();
    kc.extra_kc_res = Some(outcome.extra_consumed);

    warn!(
        appid = request.appid(),
        request_id = %request.id,
        endpoint = request.endpoint(Service::KnowledgeCenter),
        found = outcome.found(),
        removed = outcome.extra_consumed,
        "duplicates found in {}",
        Service::KnowledgeCenter
    );
}

fn deduplicate_esqs(
    data: &mut TriagedData,
    mut budget: RemovalBudget,
    defaults: DefaultCounts,
    kc_available: usize,
    request: &RequestContext,
) {
    let Some(esqs) = data.get_mut(Service::Esqs) else {
        return;
    };
    let split = defaults.esqs;
    let mut results = std::mem::take(&mut esqs.results);

    let mut url_removed = 0;
    let url_duplicates = mark_duplicate_urls(&mut results);
    if url_duplicates > 0 {
        let in_primary = url_duplicates_before(&results, split);
        info!(
            split,
            primary = in_primary,
            overflow = url_duplicates - in_primary,
            "duplicate urls in esqs"
        );
        // Without knowledge-center entries nothing can take their place.
        if kc_available > 0 {
            let (kept, removed) = remove_url_duplicates(results, split, budget);
            results = kept;
            budget.consume(removed);
            url_removed = removed;
        }
        esqs.count = results.len();
        esqs.extra_esqs_res = Some(url_removed);
    }

    let duplicates = count_duplicates(&results);
    if duplicates > 0 {
        // Without knowledge-center entries to fill the gap, never drop below
        // the visible page size.
        budget = if kc_available == 0 {
            budget.clamp(results.len().saturating_sub(request.query.nr))
        } else {
            budget.clamp(kc_available)
        };

        mark_duplicates_on_count(&mut results, budget);
        let primary = split.min(results.len());
        let marked_in_primary = results[..primary].iter().filter(|r| r.is_duplicate).count();
        let mut all_marked = results.clone();
        mark_duplicates(&mut all_marked);
        info!(
            split,
            primary = marked_in_primary,
            overflow = all_marked[primary..].iter().filter(|r| r.is_duplicate).count(),
            "title/description duplicates in esqs"
        );
        let added = url_removed + refill_count(&results[primary..], marked_in_primary);
        debug!(added, "entries pulled in past the page window");

        let before = results.len();
        results = remove_duplicates(results, budget);
        let removed = before - results.len();
        budget.consume(removed);

        warn!(
            appid = request.appid(),
            request_id = %request.id,
            endpoint = request.endpoint(Service::Esqs),
            found = duplicates,
            removed,
            "duplicates found in {}",
            Service::Esqs
        );
        esqs.count = results.len();
        esqs.extra_esqs_res = Some(added);
    }

    debug!(remaining = ?budget, "esqs removal budget");
    esqs.results = results;
}

/// Entries walked past the page window until `needed` unflagged ones have
/// been found to replace the duplicates removed from the window.
fn refill_count(overflow: &[ResultRecord], needed: usize) -> usize {
    let mut found = 0;
    let mut walked = 0;
    for record in overflow {
        if found == needed {
            break;
        }
        if !record.is_duplicate {
            found += 1;
        }
        walked += 1;
    }
    walked
}
