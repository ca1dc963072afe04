use serde::Serialize;
use tracing::{debug, warn};

use super::TriageError;
use super::matching::resolve_service;
use crate::config::UpstreamService;
use crate::request::RequestContext;
use crate::types::{ErrorRecord, RawResponse, TriagedData, UpstreamError};

/// Attaches the owning service to every failed response and strips the
/// upstream URL so it never leaves the process.
pub fn process_errors(
    responses: Vec<RawResponse>,
    registry: &[UpstreamService],
) -> Result<Vec<RawResponse>, TriageError> {
    responses
        .into_iter()
        .map(|response| match response {
            RawResponse::Failed { mut error } => {
                let url = error.url.take().unwrap_or_default();
                let service = resolve_service(&url, registry).ok_or(TriageError::EmptyRegistry)?;
                debug!(service = %service.engine_alias, status = error.status, "resolved upstream error");
                error.service = Some(service.engine_alias);
                Ok(RawResponse::Failed { error })
            }
            success => Ok(success),
        })
        .collect()
}

pub fn sort_error(error: &UpstreamError) -> ErrorRecord {
    ErrorRecord {
        service: error.service,
        status: error.status,
        message: error.message.clone(),
    }
}

/// Removes the errors from `triaged` and returns them in canonical form.
pub fn triage_errors(triaged: &mut TriagedData) -> Vec<ErrorRecord> {
    let errors = std::mem::take(&mut triaged.errors);
    if !errors.is_empty() {
        warn!(count = errors.len(), "upstream services failed");
    }
    errors.iter().map(sort_error).collect()
}

/// True when no upstream produced a payload.
pub fn is_raw_data_errors_only(responses: &[RawResponse]) -> bool {
    responses.iter().all(RawResponse::is_error)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugErrorResponse {
    pub resultset: DebugResultSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugResultSet {
    pub searchquery: DebugSearchQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userquery: Option<String>,
    pub upstream_services: Vec<ErrorRecord>,
}

/// Diagnostic envelope used when every upstream failed.
pub fn generate_debug_error_response(
    request: &RequestContext,
    responses: &[RawResponse],
) -> DebugErrorResponse {
    let upstream_services = responses
        .iter()
        .filter_map(|r| match r {
            RawResponse::Failed { error } => Some(sort_error(error)),
            RawResponse::Success { .. } => None,
        })
        .collect();

    DebugErrorResponse {
        resultset: DebugResultSet {
            searchquery: DebugSearchQuery {
                appid: request.params.appid.clone(),
                userquery: request.query.query.clone(),
                upstream_services,
            },
        },
    }
}
