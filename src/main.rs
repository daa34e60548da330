mod cli;

use clap::Parser;
use cli::{Cli, Commands, FetchArgs};
use proxyfetch::config::Config;
use proxyfetch::fetch::Fetcher;
use proxyfetch::observability::{self, FetchMetrics};
use std::io::Write;
use std::sync::Arc;
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    observability::init_tracing(&config.telemetry.log_level);

    let metrics = Arc::new(FetchMetrics::new());
    let fetcher = config.fetcher(metrics.clone())?;

    match cli.command {
        Commands::Fetch(args) => fetch(&fetcher, args).await?,
        Commands::Stats => {
            fetcher.pool().ensure_seeded().await;
            println!("{}", serde_json::to_string_pretty(&fetcher.stats())?);
        }
        Commands::Check => {
            let count = fetcher.pool().ensure_seeded().await;
            info!(proxy_file = %config.pool.proxy_file.display(), count, "Configuration OK");
            println!("{}", count);
        }
    }

    info!(metrics = ?metrics.snapshot(), "Done");
    Ok(())
}

async fn fetch(fetcher: &Fetcher, args: FetchArgs) -> Result<(), AnyError> {
    let mut options = fetcher.options().clone();
    if let Some(max_attempts) = args.max_attempts {
        options.max_attempts = max_attempts;
    }

    let mut response = fetcher.fetch_with(&args.url, &options).await?;
    if args.fail_on_status {
        response = response.error_for_status()?;
    }

    info!(
        status = response.status.as_u16(),
        size = response.body.len(),
        stats = %fetcher.stats(),
        "Fetched"
    );

    match args.output {
        Some(path) => tokio::fs::write(&path, &response.body).await?,
        None => std::io::stdout().write_all(&response.body)?,
    }

    Ok(())
}
