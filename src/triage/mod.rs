//! Error triage: splits upstream failures from payloads, resolves which
//! service an opaque failure belongs to, and canonicalizes errors for output.

mod errors;
mod matching;

pub use errors::{
    DebugErrorResponse, generate_debug_error_response, is_raw_data_errors_only, process_errors,
    sort_error, triage_errors,
};

use tracing::debug;

use crate::types::{RawResponse, TriagedData};

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("no upstream services configured; cannot attribute upstream errors")]
    EmptyRegistry,
}

/// Builds the per-request view: payloads keyed by service, failures kept in
/// arrival order.
pub fn triage_results(responses: Vec<RawResponse>) -> TriagedData {
    let mut triaged = TriagedData::default();
    for response in responses {
        match response {
            RawResponse::Success { service, set } => {
                debug!(%service, results = set.results.len(), "upstream payload");
                if triaged.services.insert(service, set).is_some() {
                    debug!(%service, "replaced earlier payload for service");
                }
            }
            RawResponse::Failed { error } => triaged.errors.push(error),
        }
    }
    triaged
}
