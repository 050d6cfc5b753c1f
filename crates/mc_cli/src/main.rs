use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mc_capture::{handle_command, init_logging, CaptureCommands, RunLogger};
use mc_core::CaptureConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture and normalize news articles", long_about = None)]
pub struct Cli {
    /// Article store: memory or sqlite
    #[arg(long, default_value = "memory")]
    storage: String,
    /// SQLite database file, used with --storage sqlite
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured number of concurrent workers
    #[arg(long)]
    workers: Option<usize>,
    #[command(subcommand)]
    command: CaptureCommands,
}

fn load_config(cli: &Cli) -> anyhow::Result<CaptureConfig> {
    let mut config = match &cli.config {
        Some(path) => CaptureConfig::load(path)?,
        None => CaptureConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let storage = mc_storage::create_storage(&cli.storage, cli.db_path.as_deref())
        .await
        .with_context(|| format!("Failed to open {} storage", cli.storage))?;
    info!("💾 Storage initialized (using {})", cli.storage);

    let logger = RunLogger::new().with_new_prefixes("mc".to_string());
    let result = handle_command(cli.command, storage, &config, &logger).await;
    let stats = logger.finish();
    if stats.total() > 0 {
        info!("{} failures logged during the run", stats.total());
    }

    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["mc", "--storage", "sqlite", "--db-path", "/tmp/mc.db", "--workers", "8", "list"]);
        assert_eq!(cli.storage, "sqlite");
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/mc.db")));
        assert_eq!(cli.command, CaptureCommands::List);
        assert_eq!(load_config(&cli).unwrap().workers, 8);
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let cli = Cli::parse_from(["mc", "--workers", "0", "list"]);
        assert!(load_config(&cli).is_err());
    }
}
