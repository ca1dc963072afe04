use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::types::Service;

/// Query parameters the core reads. `nr` is the caller's visible page size.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, deserialize_with = "count_from_number_or_string")]
    pub nr: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_grouping: Option<String>,
}

impl QueryParams {
    /// `sm=false` switches off supplemental (cross-source) suppression.
    pub fn supplemental_enabled(&self) -> bool {
        self.sm.as_deref() != Some("false")
    }
}

fn count_from_number_or_string<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(usize),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("nr must be a non-negative integer, got '{s}'"))),
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,
}

/// Everything the core knows about the inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub query: QueryParams,
    #[serde(default)]
    pub params: PathParams,
    /// Upstream URL actually requested per service; used only for log lines.
    #[serde(default)]
    pub endpoints: BTreeMap<Service, String>,
    /// Per-request correlation id.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
}

impl RequestContext {
    pub fn new(query: QueryParams, appid: Option<String>) -> Self {
        Self {
            query,
            params: PathParams { appid },
            endpoints: BTreeMap::new(),
            id: Uuid::new_v4(),
        }
    }

    pub fn appid(&self) -> &str {
        self.params.appid.as_deref().unwrap_or("-")
    }

    pub fn endpoint(&self, service: Service) -> &str {
        self.endpoints.get(&service).map(String::as_str).unwrap_or("")
    }
}
