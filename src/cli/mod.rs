mod errors;
mod params;

pub use errors::CliError;
pub use params::{Command, PageArgs};

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::aggregate;
use crate::config::ComponentsConfig;
use crate::dedup::increase_fetch_results;
use crate::types::RawResponse;
use crate::upstream::HttpUpstream;

/// Merges and deduplicates search results from the configured upstreams.
///
/// Configuration via `--config` or the `MELD_CONFIG` environment variable;
/// log verbosity via `RUST_LOG`.
#[derive(Debug, Parser)]
#[command(name = "meld", version)]
pub struct Cli {
    /// Components configuration file (JSON)
    #[arg(long, env = "MELD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Runs one subcommand and returns what should be printed on stdout.
pub async fn execute(cli: Cli) -> Result<String, CliError> {
    let path = cli.config.ok_or(CliError::MissingConfig)?;
    let config = ComponentsConfig::load(&path)?;
    info!(config = %path.display(), upstreams = config.upstream_services.len(), "config loaded");

    match cli.command {
        Command::Search { query, page, stats } => {
            let client = HttpUpstream::new(config.timeout())?;
            let mut request = page.into_request(Some(query));
            let outcome = aggregate::search(&client, &config, &mut request, stats).await?;
            render(&outcome)
        }
        Command::Merge {
            responses,
            query,
            page,
            stats,
        } => {
            let responses = read_responses(&responses)?;
            let request = page.into_request(query);
            let outcome = aggregate::merge(responses, &config, &request, stats)?;
            render(&outcome)
        }
        Command::Amplify { page } => {
            let params = page.query_params(None);
            Ok(increase_fetch_results(&config, &params).to_string())
        }
    }
}

fn read_responses(path: &std::path::Path) -> Result<Vec<RawResponse>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadResponses {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(CliError::ParseResponses)
}

fn render(value: &impl Serialize) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(CliError::Render)
}
