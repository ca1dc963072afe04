//! Components configuration: dedup settings, the upstream service registry and
//! pagination counts.
//!
//! Loaded from a JSON file whose keys follow the camelCase shape the upstream
//! gateway has always used.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Service;

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Invalid(String),
}

/// Dedup settings for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDedupConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Removal cap per request, `-1` for unbounded.
    #[serde(default = "unbounded_count")]
    pub count: i64,
    #[serde(default)]
    pub additional_fetch_percentage: f64,
}

fn unbounded_count() -> i64 {
    -1
}

impl Default for ServiceDedupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            count: unbounded_count(),
            additional_fetch_percentage: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    /// Only the full-text service is ever deduplicated in place.
    #[serde(default)]
    pub esqs: ServiceDedupConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamService {
    pub engine_alias: Service,
    pub url: String,
}

/// Per-page slots reserved for knowledge-center entries interleaved into the
/// esqs page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    #[serde(default)]
    pub knowledge_center: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsConfig {
    #[serde(default)]
    pub deduplication: DeduplicationConfig,
    #[serde(default)]
    pub upstream_services: Vec<UpstreamService>,
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Per-upstream fan-out timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            deduplication: DeduplicationConfig::default(),
            upstream_services: Vec::new(),
            pagination: PaginationConfig::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ComponentsConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks:
    /// - at least one upstream service is registered, each alias once
    /// - `deduplication.esqs.count` is `-1` or greater
    /// - `additionalFetchPercentage` is a finite, non-negative number
    /// - `timeoutMs` is greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream_services.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one upstream service must be configured".into(),
            ));
        }
        for (i, service) in self.upstream_services.iter().enumerate() {
            if service.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "upstream service '{}' has an empty url",
                    service.engine_alias
                )));
            }
            if self.upstream_services[..i]
                .iter()
                .any(|s| s.engine_alias == service.engine_alias)
            {
                return Err(ConfigError::Invalid(format!(
                    "upstream service '{}' is configured more than once",
                    service.engine_alias
                )));
            }
        }
        let esqs = &self.deduplication.esqs;
        if esqs.count < -1 {
            return Err(ConfigError::Invalid(
                "deduplication.esqs.count must be -1 (unbounded) or >= 0".into(),
            ));
        }
        if !esqs.additional_fetch_percentage.is_finite() || esqs.additional_fetch_percentage < 0.0 {
            return Err(ConfigError::Invalid(
                "deduplication.esqs.additionalFetchPercentage must be >= 0".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeoutMs must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn upstream(&self, service: Service) -> Option<&UpstreamService> {
        self.upstream_services.iter().find(|s| s.engine_alias == service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Vec<UpstreamService> {
        vec![UpstreamService {
            engine_alias: Service::Esqs,
            url: "http://esqs.internal/api/v1/search".into(),
        }]
    }

    fn valid() -> ComponentsConfig {
        ComponentsConfig {
            upstream_services: registry(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_camel_case_shape() {
        let config: ComponentsConfig = serde_json::from_value(json!({
            "deduplication": {"esqs": {"enabled": true, "count": 5, "additionalFetchPercentage": 20}},
            "upstreamServices": [
                {"engineAlias": "esqs", "url": "http://esqs.internal/api"},
                {"engineAlias": "knowledgeCenter", "url": "http://kc.internal/search"}
            ],
            "pagination": {"knowledgeCenter": 3}
        }))
        .unwrap();

        assert!(config.deduplication.esqs.enabled);
        assert_eq!(config.deduplication.esqs.count, 5);
        assert_eq!(config.deduplication.esqs.additional_fetch_percentage, 20.0);
        assert_eq!(config.upstream_services.len(), 2);
        assert_eq!(config.pagination.knowledge_center, 3);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_dedup_section_defaults_to_disabled_unbounded() {
        let config: ComponentsConfig = serde_json::from_value(json!({
            "upstreamServices": [{"engineAlias": "esqs", "url": "http://esqs"}]
        }))
        .unwrap();
        assert!(!config.deduplication.esqs.enabled);
        assert_eq!(config.deduplication.esqs.count, -1);
    }

    #[test]
    fn empty_registry_rejected() {
        let err = ComponentsConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("upstream service"));
    }

    #[test]
    fn duplicate_alias_rejected() {
        let mut config = valid();
        config.upstream_services.extend(registry());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn count_below_unbounded_rejected() {
        let mut config = valid();
        config.deduplication.esqs.count = -2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn negative_percentage_rejected() {
        let mut config = valid();
        config.deduplication.esqs.additional_fetch_percentage = -5.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("additionalFetchPercentage"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = ComponentsConfig {
            timeout_ms: 0,
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeoutMs"));
    }

    #[test]
    fn upstream_lookup_by_service() {
        let config = valid();
        assert!(config.upstream(Service::Esqs).is_some());
        assert!(config.upstream(Service::Catalog).is_none());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ComponentsConfig::load(Path::new("/nonexistent/meld.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
