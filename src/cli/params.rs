use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::request::{QueryParams, RequestContext};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Query every configured upstream and print the merged results
    Search {
        /// Search query forwarded to every upstream
        #[arg(long)]
        query: String,
        #[command(flatten)]
        page: PageArgs,
        /// Log a duplicate table per service before deduplication
        #[arg(long)]
        stats: bool,
    },
    /// Merge a recorded JSON array of upstream responses
    Merge {
        /// File holding the recorded responses
        #[arg(long)]
        responses: PathBuf,
        /// Query the responses were recorded for (echoed in diagnostics)
        #[arg(long)]
        query: Option<String>,
        #[command(flatten)]
        page: PageArgs,
        #[arg(long)]
        stats: bool,
    },
    /// Print how many esqs results would be requested for a page
    Amplify {
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// Visible page size
    #[arg(long, default_value_t = 10)]
    pub nr: usize,
    /// Application the request is made on behalf of
    #[arg(long)]
    pub appid: Option<String>,
    /// Supplemental results; "false" turns off cross-source suppression
    #[arg(long)]
    pub sm: Option<String>,
    /// Grouping to switch off; "title_snippet" disables deduplication
    #[arg(long)]
    pub disable_grouping: Option<String>,
}

impl PageArgs {
    pub fn query_params(&self, query: Option<String>) -> QueryParams {
        QueryParams {
            query,
            nr: self.nr,
            sm: self.sm.clone(),
            disable_grouping: self.disable_grouping.clone(),
        }
    }

    pub fn into_request(self, query: Option<String>) -> RequestContext {
        let params = self.query_params(query);
        RequestContext::new(params, self.appid)
    }
}
