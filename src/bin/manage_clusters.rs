use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use newswire::clustering;
use newswire::db::Database;
use newswire::environment::database_path;
use prettytable::{Cell, Row as PrettyRow, Table};

#[derive(Parser)]
#[clap(name = "cluster-manager", about = "Inspect and repair near-duplicate clusters")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the most recently updated clusters
    List {
        /// Number of clusters to show
        #[clap(short, long, default_value = "10")]
        limit: i64,
    },

    /// Show details about a specific cluster
    Show {
        /// Cluster ID
        #[clap(required = true)]
        id: String,

        /// Show articles in this cluster
        #[clap(short, long)]
        articles: bool,
    },

    /// Recompute article counts from actual cluster membership
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    newswire::logging::configure_logging();

    let args = Cli::parse();

    let db = Database::new(&database_path())
        .await
        .context("Failed to connect to database")?;

    match args.command {
        Commands::List { limit } => list_clusters(&db, limit).await?,
        Commands::Show { id, articles } => show_cluster(&db, &id, articles).await?,
        Commands::Reconcile => {
            let corrected = clustering::reconcile_cluster_counts(&db).await?;
            println!("Corrected article counts on {} clusters", corrected);
        }
    }

    Ok(())
}

fn local_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Lists clusters in a formatted table
async fn list_clusters(db: &Database, limit: i64) -> Result<()> {
    let clusters = clustering::list_clusters(db, limit).await?;

    let mut table = Table::new();
    table.add_row(PrettyRow::new(vec![
        Cell::new("ID"),
        Cell::new("First Seen"),
        Cell::new("Updated"),
        Cell::new("Articles"),
        Cell::new("Main Article"),
        Cell::new("Title"),
    ]));

    for cluster in clusters {
        table.add_row(PrettyRow::new(vec![
            Cell::new(&cluster.id),
            Cell::new(&local_time(&cluster.first_seen_at)),
            Cell::new(&local_time(&cluster.last_updated_at)),
            Cell::new(&cluster.article_count.to_string()),
            Cell::new(&cluster.main_article_id.to_string()),
            Cell::new(&cluster.title),
        ]));
    }

    table.printstd();
    Ok(())
}

/// Shows detailed information about a specific cluster
async fn show_cluster(db: &Database, cluster_id: &str, show_articles: bool) -> Result<()> {
    let cluster = match clustering::get_cluster(db, cluster_id).await? {
        Some(c) => c,
        None => {
            println!("Cluster {} not found", cluster_id);
            return Ok(());
        }
    };

    println!("=== CLUSTER {} ===", cluster.id);
    println!("Title: {}", cluster.title);
    println!("Main article: {}", cluster.main_article_id);
    println!("First seen: {}", local_time(&cluster.first_seen_at));
    println!("Updated: {}", local_time(&cluster.last_updated_at));
    println!("Articles: {}", cluster.article_count);

    let members = clustering::cluster_members(db, cluster_id).await?;
    if members.len() as i64 != cluster.article_count {
        println!(
            "Note: {} linked articles differ from the recorded count; run `reconcile` to repair",
            members.len()
        );
    }

    if show_articles {
        let mut table = Table::new();
        table.add_row(PrettyRow::new(vec![
            Cell::new("ID"),
            Cell::new("Source"),
            Cell::new("Published"),
            Cell::new("Title"),
        ]));
        for article in members {
            table.add_row(PrettyRow::new(vec![
                Cell::new(&article.id.to_string()),
                Cell::new(&article.source_id),
                Cell::new(&local_time(&article.published_at)),
                Cell::new(&article.title),
            ]));
        }
        table.printstd();
    }

    Ok(())
}
