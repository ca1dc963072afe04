mod aggregate;
mod cli;
mod config;
mod dedup;
mod request;
mod triage;
mod types;
mod upstream;

pub const USER_AGENT: &str = concat!("meld/", env!("CARGO_PKG_VERSION"));

use clap::Parser;
use cli::Cli;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("meld=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("starting meld");

    let output = cli::execute(cli)
        .await
        .inspect_err(|e| tracing::error!("{e}"))?;
    println!("{output}");
    Ok(())
}
