use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row as PrettyRow, Table};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

use newswire::config::DedupConfig;
use newswire::db::Database;
use newswire::dedup::types::{CandidateArticle, OutletBatch};
use newswire::dedup::{load_feed, load_flagged_page, DuplicateClassifier};
use newswire::environment::database_path;
use newswire::pipeline;

#[derive(Parser)]
#[command(author, version, about = "Cross-source news de-duplication", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest outlet batches from a JSON file (array of {source_id, articles})
    Ingest {
        /// Path to the batch file
        file: PathBuf,

        /// Anchor the history window at this RFC 3339 time instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Classify a single article against the history window without storing it
    Check {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        content: String,

        #[arg(short, long)]
        url: String,
    },

    /// Show the de-duplicated feed
    Feed {
        /// Number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show an admin page with source-priority duplicate flags
    Flags {
        #[arg(short, long, default_value = "1")]
        page: i64,

        #[arg(long, default_value = "50")]
        per_page: i64,
    },

    /// Recompute normalized titles and content hashes where missing or stale
    Backfill,

    /// Display row counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    newswire::logging::configure_logging();

    let cli = Cli::parse();
    let config = DedupConfig::from_env();

    let db = Database::new(&database_path())
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Ingest { file, now } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let batches: Vec<OutletBatch> =
                serde_json::from_str(&raw).context("Failed to parse batch file")?;
            info!("Loaded {} outlet batches from {}", batches.len(), file.display());

            let classifier = DuplicateClassifier::new(config.classifier.clone());
            let now = now.unwrap_or_else(Utc::now);
            let results = pipeline::ingest_outlets(&db, &classifier, &batches, now).await;

            let mut failed = 0;
            for (batch, result) in batches.iter().zip(results) {
                match result {
                    Ok(report) => println!(
                        "{}: {} candidates, {} inserted, {} exact duplicates, {} already stored, {} clustered, {} cluster failures",
                        report.source_id,
                        report.candidates,
                        report.inserted,
                        report.exact_duplicates,
                        report.already_stored,
                        report.clustered,
                        report.cluster_failures
                    ),
                    Err(e) => {
                        failed += 1;
                        error!("Batch for {} failed: {:#}", batch.source_id, e);
                        println!("{}: FAILED ({:#})", batch.source_id, e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} outlet batches failed", failed, batches.len());
            }
        }

        Commands::Check {
            title,
            content,
            url,
        } => {
            let candidate = CandidateArticle {
                external_id: None,
                title,
                content,
                summary: None,
                source_url: url,
                published_at: Utc::now(),
            };
            let classifier = DuplicateClassifier::new(config.classifier.clone());
            let result =
                pipeline::check_candidate(&db, &classifier, &candidate, Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Feed { limit } => {
            let feed = load_feed(&db, &config.feed, limit).await?;

            let mut table = Table::new();
            table.add_row(PrettyRow::new(vec![
                Cell::new("ID"),
                Cell::new("Source"),
                Cell::new("Published"),
                Cell::new("Cluster"),
                Cell::new("Title"),
            ]));
            for article in feed {
                table.add_row(PrettyRow::new(vec![
                    Cell::new(&article.id.to_string()),
                    Cell::new(&article.source_id),
                    Cell::new(
                        &article
                            .published_at
                            .with_timezone(&Local)
                            .format("%Y-%m-%d %H:%M")
                            .to_string(),
                    ),
                    Cell::new(article.cluster_id.as_deref().unwrap_or("-")),
                    Cell::new(&article.title),
                ]));
            }
            table.printstd();
        }

        Commands::Flags { page, per_page } => {
            let rows = load_flagged_page(&db, &config.flagger, page, per_page).await?;

            let mut table = Table::new();
            table.add_row(PrettyRow::new(vec![
                Cell::new("ID"),
                Cell::new("Source"),
                Cell::new("Rank"),
                Cell::new("Duplicate Of"),
                Cell::new("Title"),
            ]));
            for (article, flag) in rows {
                let rank = config.flagger.priorities.rank(&article.source_id);
                table.add_row(PrettyRow::new(vec![
                    Cell::new(&article.id.to_string()),
                    Cell::new(&article.source_id),
                    Cell::new(&if rank == newswire::config::UNRANKED_PRIORITY {
                        "-".to_string()
                    } else {
                        rank.to_string()
                    }),
                    Cell::new(
                        &flag
                            .similar_to_id
                            .map(|id| id.to_string())
                            .unwrap_or_default(),
                    ),
                    Cell::new(&article.title),
                ]));
            }
            table.printstd();
        }

        Commands::Backfill => {
            let updated = db.backfill_derived_fields().await?;
            println!("Updated derived fields on {} articles", updated);
        }

        Commands::Stats => {
            let stats = db.collect_stats().await?;
            println!("Articles: {}", stats.articles);
            println!("Clustered articles: {}", stats.clustered_articles);
            println!("Clusters: {}", stats.clusters);
        }
    }

    Ok(())
}
