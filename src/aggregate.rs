//! Request pipeline: fan out to the registered upstreams, triage the outcomes,
//! deduplicate and shape the response.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ComponentsConfig, ConfigError};
use crate::dedup::{count_duplicates, deduplicate, duplicate_stats_table, increase_fetch_results};
use crate::request::RequestContext;
use crate::triage::{
    DebugErrorResponse, TriageError, generate_debug_error_response, is_raw_data_errors_only,
    process_errors, triage_errors, triage_results,
};
use crate::types::{ErrorRecord, RawResponse, ResultSet, Service, UpstreamError};
use crate::upstream::{UpstreamClient, UpstreamFailure, endpoint};

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Triage(#[from] TriageError),
}

/// Merged result sets keyed by service, followed by the failed upstreams.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResponse {
    #[serde(flatten)]
    pub services: BTreeMap<Service, ResultSet>,
    pub errors: Vec<ErrorRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateOutcome {
    Merged(AggregateResponse),
    /// Every upstream failed.
    AllFailed(DebugErrorResponse),
}

pub async fn search(
    client: &impl UpstreamClient,
    config: &ComponentsConfig,
    request: &mut RequestContext,
    stats: bool,
) -> Result<AggregateOutcome, AggregateError> {
    config.validate()?;
    let responses = fan_out(client, config, request).await;
    Ok(merge(responses, config, request, stats)?)
}

/// Queries every registered upstream concurrently. Failures come back as
/// error payloads carrying the failing URL, never as `Err`. The URL actually
/// requested per service is recorded on `request`.
pub async fn fan_out(
    client: &impl UpstreamClient,
    config: &ComponentsConfig,
    request: &mut RequestContext,
) -> Vec<RawResponse> {
    let query = request.query.query.clone().unwrap_or_default();
    let timeout = config.timeout();

    let mut targets = Vec::new();
    for service in Service::ALL {
        let Some(upstream) = config.upstream(service) else {
            continue;
        };
        let nr = match service {
            Service::Esqs => increase_fetch_results(config, &request.query),
            Service::KnowledgeCenter | Service::Catalog => request.query.nr,
        };
        let url = endpoint(&upstream.url, &query, nr);
        let raw = match &url {
            Ok(url) => url.to_string(),
            Err(_) => upstream.url.clone(),
        };
        request.endpoints.insert(service, raw.clone());
        targets.push((service, raw, url));
    }

    let fetches = targets.into_iter().map(|(service, raw, url)| async move {
        let outcome = match url {
            Ok(url) => tokio::time::timeout(timeout, client.fetch(&url))
                .await
                .unwrap_or(Err(UpstreamFailure::Timeout(timeout.as_millis()))),
            Err(e) => Err(UpstreamFailure::InvalidUrl(e)),
        };
        match outcome {
            Ok(set) => RawResponse::Success { service, set },
            Err(e) => {
                warn!(%service, error = %e, "upstream request failed (continuing with other results)");
                RawResponse::Failed {
                    error: UpstreamError {
                        service: None,
                        status: e.status(),
                        message: Some(e.message()),
                        url: Some(raw),
                    },
                }
            }
        }
    });

    join_all(fetches).await
}

/// Runs triage and deduplication over recorded fan-out outcomes.
pub fn merge(
    responses: Vec<RawResponse>,
    config: &ComponentsConfig,
    request: &RequestContext,
    stats: bool,
) -> Result<AggregateOutcome, TriageError> {
    let responses = process_errors(responses, &config.upstream_services)?;
    if is_raw_data_errors_only(&responses) {
        warn!(
            appid = request.appid(),
            request_id = %request.id,
            failed = responses.len(),
            "no upstream returned results"
        );
        return Ok(AggregateOutcome::AllFailed(generate_debug_error_response(
            request, &responses,
        )));
    }
    if stats {
        log_duplicate_stats(&responses);
    }

    let triaged = triage_results(responses);
    let mut deduplicated = deduplicate(&triaged, config, request);
    let errors = triage_errors(&mut deduplicated);

    info!(
        request_id = %request.id,
        services = deduplicated.services.len(),
        errors = errors.len(),
        "merged upstream results"
    );
    Ok(AggregateOutcome::Merged(AggregateResponse {
        services: deduplicated.services,
        errors,
    }))
}

fn log_duplicate_stats(responses: &[RawResponse]) {
    for response in responses {
        if let RawResponse::Success { service, set } = response {
            info!(
                %service,
                duplicates = count_duplicates(&set.results),
                "duplicate stats\n{}",
                duplicate_stats_table(&set.results)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;
    use url::Url;

    use crate::config::UpstreamService;
    use crate::request::QueryParams;
    use crate::types::ResultRecord;

    struct MockUpstream {
        responses: HashMap<&'static str, Result<ResultSet, u16>>,
        delay: Option<(&'static str, Duration)>,
        requested: Mutex<Vec<String>>,
    }

    impl MockUpstream {
        fn new(responses: Vec<(&'static str, Result<ResultSet, u16>)>) -> Self {
            Self {
                responses: responses.into_iter().collect(),
                delay: None,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn captured_urls(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl UpstreamClient for MockUpstream {
        async fn fetch(&self, endpoint: &Url) -> Result<ResultSet, UpstreamFailure> {
            self.requested.lock().unwrap().push(endpoint.to_string());
            let host = endpoint.host_str().unwrap_or("");
            if let Some((slow, delay)) = self.delay
                && slow == host
            {
                tokio::time::sleep(delay).await;
            }
            match self.responses.get(host) {
                Some(Ok(set)) => Ok(set.clone()),
                Some(Err(code)) => Err(UpstreamFailure::Api {
                    code: *code,
                    message: format!("{host} unavailable"),
                }),
                None => Err(UpstreamFailure::Decode("no fixture".into())),
            }
        }
    }

    fn rec(title: &str, description: &str, url: &str) -> ResultRecord {
        ResultRecord::new(title, description, url)
    }

    fn registry_config() -> ComponentsConfig {
        let mut config = ComponentsConfig::default();
        config.upstream_services = vec![
            UpstreamService {
                engine_alias: Service::Esqs,
                url: "https://esqs.test/api/search".into(),
            },
            UpstreamService {
                engine_alias: Service::KnowledgeCenter,
                url: "https://kc.test/api/search".into(),
            },
            UpstreamService {
                engine_alias: Service::Catalog,
                url: "https://catalog.test/api/search".into(),
            },
        ];
        config.deduplication.esqs.enabled = true;
        config.deduplication.esqs.additional_fetch_percentage = 20.0;
        config.pagination.knowledge_center = 1;
        config
    }

    fn request(nr: usize) -> RequestContext {
        RequestContext::new(
            QueryParams {
                query: Some("rust".into()),
                nr,
                ..Default::default()
            },
            Some("portal".into()),
        )
    }

    #[tokio::test]
    async fn fan_out_amplifies_esqs_only_and_records_endpoints() {
        let mock = MockUpstream::new(vec![
            ("esqs.test", Ok(ResultSet::default())),
            ("kc.test", Ok(ResultSet::default())),
            ("catalog.test", Ok(ResultSet::default())),
        ]);
        let mut req = request(10);

        let responses = fan_out(&mock, &registry_config(), &mut req).await;
        assert_eq!(responses.len(), 3);
        assert!(responses.iter().all(|r| !r.is_error()));

        let urls = mock.captured_urls();
        assert!(urls.contains(&"https://esqs.test/api/search?query=rust&nr=12".to_string()));
        assert!(urls.contains(&"https://kc.test/api/search?query=rust&nr=10".to_string()));
        assert_eq!(req.endpoint(Service::Esqs), "https://esqs.test/api/search?query=rust&nr=12");
        assert_eq!(req.endpoint(Service::Catalog), "https://catalog.test/api/search?query=rust&nr=10");
    }

    #[tokio::test]
    async fn fan_out_failure_keeps_url_and_status() {
        let mock = MockUpstream::new(vec![
            ("esqs.test", Ok(ResultSet::default())),
            ("kc.test", Err(503)),
        ]);
        let mut config = registry_config();
        config.upstream_services.truncate(2);

        let responses = fan_out(&mock, &config, &mut request(5)).await;
        let failed: Vec<&UpstreamError> = responses
            .iter()
            .filter_map(|r| match r {
                RawResponse::Failed { error } => Some(error),
                RawResponse::Success { .. } => None,
            })
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, 503);
        assert_eq!(failed[0].message.as_deref(), Some("kc.test unavailable"));
        assert_eq!(failed[0].service, None);
        assert!(failed[0].url.as_deref().unwrap().starts_with("https://kc.test/api/search"));
    }

    #[tokio::test]
    async fn fan_out_slow_upstream_becomes_timeout_error() {
        let mut mock = MockUpstream::new(vec![
            ("esqs.test", Ok(ResultSet::default())),
            ("kc.test", Ok(ResultSet::default())),
        ]);
        mock.delay = Some(("kc.test", Duration::from_secs(2)));
        let mut config = registry_config();
        config.upstream_services.truncate(2);
        config.timeout_ms = 50;

        let responses = fan_out(&mock, &config, &mut request(5)).await;
        let statuses: Vec<u16> = responses
            .iter()
            .filter_map(|r| match r {
                RawResponse::Failed { error } => Some(error.status),
                RawResponse::Success { .. } => None,
            })
            .collect();
        assert_eq!(statuses, [504]);
    }

    #[tokio::test]
    async fn search_merges_and_deduplicates() {
        let mut esqs = ResultSet::from_results(vec![
            rec("A", "x", "u1"),
            rec("A", "x", "u2"),
            rec("B", "y", "u3"),
        ]);
        esqs.sm_count = 0;
        let kc = ResultSet::from_results(vec![rec("K1", "k", "k1"), rec("K2", "k", "k2")]);
        let mock = MockUpstream::new(vec![
            ("esqs.test", Ok(esqs)),
            ("kc.test", Ok(kc)),
            ("catalog.test", Err(500)),
        ]);
        let mut req = request(3);

        let outcome = search(&mock, &registry_config(), &mut req, true).await.unwrap();
        let AggregateOutcome::Merged(response) = outcome else {
            panic!("expected merged response");
        };
        let esqs = &response.services[&Service::Esqs];
        assert_eq!(esqs.count, 2);
        assert_eq!(response.services[&Service::KnowledgeCenter].count, 2);
        assert!(!response.services.contains_key(&Service::Catalog));
        assert_eq!(
            response.errors,
            [ErrorRecord {
                service: Some(Service::Catalog),
                status: 500,
                message: Some("catalog.test unavailable".into()),
            }]
        );
    }

    #[tokio::test]
    async fn search_rejects_invalid_config() {
        let mock = MockUpstream::new(vec![]);
        let err = search(&mock, &ComponentsConfig::default(), &mut request(3), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::Config(_)));
    }

    #[test]
    fn merge_all_failed_returns_debug_envelope() {
        let responses: Vec<RawResponse> = serde_json::from_value(json!([
            {"error": {"status": 502, "message": "bad gateway", "url": "https://esqs.test/api/search?query=rust"}},
            {"error": {"status": 504, "url": "https://kc.test/api/search?query=rust"}}
        ]))
        .unwrap();

        let outcome = merge(responses, &registry_config(), &request(3), false).unwrap();
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({
                "resultset": {
                    "searchquery": {
                        "appid": "portal",
                        "userquery": "rust",
                        "upstreamServices": [
                            {"service": "esqs", "status": 502, "message": "bad gateway"},
                            {"service": "knowledgeCenter", "status": 504}
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn merge_output_shape() {
        let responses: Vec<RawResponse> = serde_json::from_value(json!([
            {"service": "esqs", "results": [{"title": "A", "description": "x", "url": "u1"}], "count": 1},
            {"error": {"status": 500, "url": "https://catalog.test/api/search"}}
        ]))
        .unwrap();

        let outcome = merge(responses, &registry_config(), &request(3), false).unwrap();
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["esqs"]["count"], 1);
        assert_eq!(value["errors"], json!([{"service": "catalog", "status": 500}]));
    }

    #[test]
    fn merge_with_errors_and_empty_registry_fails() {
        let responses = vec![RawResponse::Failed {
            error: UpstreamError {
                status: 500,
                url: Some("https://esqs.test".into()),
                ..Default::default()
            },
        }];
        let err = merge(responses, &ComponentsConfig::default(), &request(3), false).unwrap_err();
        assert!(matches!(err, TriageError::EmptyRegistry));
    }
}
