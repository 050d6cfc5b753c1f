use std::sync::Arc;

use clap::Subcommand;
use mc_core::{ArticleStatus, ArticleStore, CaptureConfig, Result};

use crate::forward::{Forwarder, HttpIngestClient};
use crate::logging::RunLogger;
use crate::manager::{Outcome, ScraperManager};
use crate::repair::DateRepair;
use crate::scrapers::SourceRegistry;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CaptureCommands {
    /// Discover and capture the latest articles
    Capture {
        /// Source id (e.g. estadao). Captures every source when omitted.
        #[arg(long)]
        source: Option<String>,
        /// Category to crawl. Every category of the source when omitted.
        #[arg(long)]
        category: Option<String>,
        /// Index pages to walk per category
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Capture a single article URL
    Url { url: String },
    /// List sources, their categories and stored article counts
    List,
    /// Send extracted articles downstream
    Forward {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        skip: usize,
    },
    /// Parse stored raw dates that have no timestamp yet
    RepairDates,
}

pub async fn handle_command(
    command: CaptureCommands,
    store: Arc<dyn ArticleStore>,
    config: &CaptureConfig,
    logger: &RunLogger,
) -> Result<()> {
    match command {
        CaptureCommands::Capture {
            source,
            category,
            pages,
        } => {
            let manager = ScraperManager::from_config(store, config)?;
            logger.info(&format!(
                "Capturing {}",
                source.as_deref().unwrap_or("all sources")
            ));
            let report = manager
                .run_source(source.as_deref(), category.as_deref(), pages, logger)
                .await?;
            println!(
                "{} discovered, {} stored, {} skipped, {} failed",
                report.discovered, report.persisted, report.skipped, report.failed
            );
        }
        CaptureCommands::Url { url } => {
            let manager = ScraperManager::from_config(store.clone(), config)?;
            match manager.scrape_url(&url, logger).await? {
                Outcome::Persisted { link, status } => {
                    println!("🆕 {} ({})", link, status);
                    if let Some(article) = store.find_by_link(&link).await? {
                        println!("  title: {}", article.title.as_deref().unwrap_or("-"));
                        println!(
                            "  published: {}",
                            article
                                .published_time
                                .map(|ts| ts.to_rfc3339())
                                .unwrap_or_else(|| "-".to_string())
                        );
                        println!(
                            "  language: {}",
                            article.language.map(|l| l.name).unwrap_or_else(|| "-".to_string())
                        );
                    }
                }
                Outcome::Skipped => println!("⏭️ {} is already stored", url),
                Outcome::Failed { stage, reason } => {
                    println!("❌ {}: {} failed: {}", url, stage.step(), reason)
                }
            }
        }
        CaptureCommands::List => {
            for adapter in SourceRegistry::with_defaults().adapters() {
                let meta = adapter.source_metadata();
                let stored = store.get_by_source(meta.id).await?.len();
                println!("{}/{} - {} ({} stored)", meta.region.name, meta.id, meta.name, stored);
                println!("  categories: {}", adapter.categories().join(", "));
            }
            for status in [
                ArticleStatus::Fetched,
                ArticleStatus::Extracted,
                ArticleStatus::SentDownstream,
                ArticleStatus::Failed,
            ] {
                println!("{}: {}", status, store.count_by_status(status).await?);
            }
        }
        CaptureCommands::Forward { limit, skip } => {
            let sink = Arc::new(HttpIngestClient::from_config(config)?);
            let report = Forwarder::new(store, sink, config)
                .forward(limit, skip, logger)
                .await?;
            println!("{} sent, {} failed", report.sent, report.failed);
        }
        CaptureCommands::RepairDates => {
            let repair = DateRepair::new(store)
                .with_local_offset(config.local_offset()?)
                .with_batch_size(config.page_size);
            let report = repair.run(logger).await?;
            println!(
                "{} examined, {} repaired, {} still unparseable, {} not stored",
                report.examined, report.repaired, report.unparseable, report.failed
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use mc_core::Error;
    use mc_storage::backends::MemoryStorage;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        command: CaptureCommands,
    }

    fn parse(args: &[&str]) -> CaptureCommands {
        TestCli::parse_from(std::iter::once("mc").chain(args.iter().copied())).command
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse(&["capture", "--source", "estadao", "--category", "politica", "--pages", "3"]),
            CaptureCommands::Capture {
                source: Some("estadao".to_string()),
                category: Some("politica".to_string()),
                pages: 3
            }
        );
        assert_eq!(
            parse(&["capture"]),
            CaptureCommands::Capture {
                source: None,
                category: None,
                pages: 1
            }
        );
        assert_eq!(
            parse(&["forward", "--limit", "10"]),
            CaptureCommands::Forward {
                limit: Some(10),
                skip: 0
            }
        );
        assert_eq!(parse(&["repair-dates"]), CaptureCommands::RepairDates);
    }

    #[tokio::test]
    async fn test_unknown_category_fails_before_any_fetch() {
        let store = Arc::new(MemoryStorage::new());
        let command = CaptureCommands::Capture {
            source: Some("valor".to_string()),
            category: Some("esportes".to_string()),
            pages: 1,
        };
        let err = handle_command(command, store, &CaptureConfig::default(), &RunLogger::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_forward_requires_ingest_url() {
        let store = Arc::new(MemoryStorage::new());
        let command = CaptureCommands::Forward { limit: None, skip: 0 };
        let err = handle_command(command, store, &CaptureConfig::default(), &RunLogger::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_list_and_repair_on_empty_store() {
        let store: Arc<dyn ArticleStore> = Arc::new(MemoryStorage::new());
        let config = CaptureConfig::default();
        let logger = RunLogger::new();
        handle_command(CaptureCommands::List, store.clone(), &config, &logger)
            .await
            .unwrap();
        handle_command(CaptureCommands::RepairDates, store, &config, &logger)
            .await
            .unwrap();
    }
}
