use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upstream search backends known to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Service {
    /// Full-text query service.
    #[serde(rename = "esqs")]
    Esqs,
    /// Documentation / knowledge-base search.
    #[serde(rename = "knowledgeCenter")]
    KnowledgeCenter,
    /// Product catalog search.
    #[serde(rename = "catalog")]
    Catalog,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Esqs, Service::KnowledgeCenter, Service::Catalog];

    pub fn alias(self) -> &'static str {
        match self {
            Service::Esqs => "esqs",
            Service::KnowledgeCenter => "knowledgeCenter",
            Service::Catalog => "catalog",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// A single normalized search hit. Fields other than the identity fields are
/// carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_duplicate_url: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Content identity used for title/description deduplication.
    pub fn identity(&self) -> (&str, &str) {
        (&self.title, &self.description)
    }
}

/// Ordered results from one upstream plus the counters the paginator reads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    #[serde(default)]
    pub results: Vec<ResultRecord>,
    #[serde(default)]
    pub count: usize,
    /// Leading esqs entries eligible for cross-source dedup against the knowledge center.
    #[serde(default)]
    pub sm_count: usize,
    /// Entries the paginator must take from past the page window: URL
    /// duplicates actually removed, plus the refill walk of the title pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_esqs_res: Option<usize>,
    #[serde(default, rename = "extraKCRes", skip_serializing_if = "Option::is_none")]
    pub extra_kc_res: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultSet {
    pub fn from_results(results: Vec<ResultRecord>) -> Self {
        Self {
            count: results.len(),
            results,
            ..Default::default()
        }
    }
}

/// Failure reported for one upstream. `url` is the failing request URL and is
/// cleared once the owning service has been resolved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpstreamError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Externally visible error entry, keys in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One fan-out outcome before triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawResponse {
    Failed {
        error: UpstreamError,
    },
    Success {
        service: Service,
        #[serde(flatten)]
        set: ResultSet,
    },
}

impl RawResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, RawResponse::Failed { .. })
    }
}

/// Per-request merged view: successful result sets keyed by service plus the
/// errors of the upstreams that failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TriagedData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<UpstreamError>,
    #[serde(flatten)]
    pub services: BTreeMap<Service, ResultSet>,
}

impl TriagedData {
    pub fn get(&self, service: Service) -> Option<&ResultSet> {
        self.services.get(&service)
    }

    pub fn get_mut(&mut self, service: Service) -> Option<&mut ResultSet> {
        self.services.get_mut(&service)
    }
}
