use crate::aggregate::AggregateError;
use crate::config::ConfigError;
use crate::triage::TriageError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("no config file given (pass --config or set MELD_CONFIG)")]
    MissingConfig,

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("failed to read responses {path}: {source}")]
    ReadResponses {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid responses file: {0} (expected a JSON array of upstream responses)")]
    ParseResponses(serde_json::Error),

    #[error("{0}")]
    Aggregate(#[from] AggregateError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to render output: {0}")]
    Render(serde_json::Error),
}

impl From<TriageError> for CliError {
    fn from(e: TriageError) -> Self {
        Self::Aggregate(AggregateError::Triage(e))
    }
}
