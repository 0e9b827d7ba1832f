use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use sqlx::{self, Row, Sqlite, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::article::{article_from_row, ARTICLE_COLUMNS};
use super::core::{parse_db_time, to_db_time, Database};
use crate::clustering::{ArticleCluster, ClusterLink};
use crate::dedup::types::Article;

/// Adds `candidate_id` to an existing cluster and bumps its bookkeeping.
///
/// # Arguments
/// * `db` - Database instance
/// * `cluster_id` - Cluster the matched article already belongs to
/// * `candidate_id` - Newly inserted article to link
/// * `now` - Timestamp recorded as `last_updated_at`
///
/// # Returns
/// * `Ok(ClusterLink::Joined)` - The candidate is now a member
/// * `Err` - If the cluster does not exist or a write failed; nothing is committed
pub async fn join_cluster(
    db: &Database,
    cluster_id: &str,
    candidate_id: i64,
    now: DateTime<Utc>,
) -> Result<ClusterLink> {
    let mut tx = db.pool().begin().await?;
    join_in_tx(&mut tx, cluster_id, candidate_id, now).await?;
    tx.commit().await?;

    debug!("Article {} joined cluster {}", candidate_id, cluster_id);
    Ok(ClusterLink::Joined(cluster_id.to_string()))
}

async fn join_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    cluster_id: &str,
    candidate_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE article_clusters
        SET article_count = article_count + 1,
            last_updated_at = ?1
        WHERE id = ?2
        "#,
    )
    .bind(to_db_time(&now))
    .bind(cluster_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated != 1 {
        bail!("cluster {} does not exist", cluster_id);
    }

    sqlx::query("UPDATE articles SET cluster_id = ?1 WHERE id = ?2")
        .bind(cluster_id)
        .bind(candidate_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Creates a cluster around `matched` (the earlier article) and `candidate_id`.
///
/// The matched article's cluster is re-read inside the transaction; if another
/// batch clustered it since the history window was loaded, the candidate joins
/// that cluster instead of opening a second one.
///
/// # Returns
/// * `Ok(ClusterLink::Created)` - New cluster with `article_count = 2`
/// * `Ok(ClusterLink::Joined)` - The matched article had gained a cluster meanwhile
/// * `Err` - If any write failed; nothing is committed
pub async fn create_cluster(
    db: &Database,
    matched: &Article,
    candidate_id: i64,
    candidate_title: &str,
    now: DateTime<Utc>,
) -> Result<ClusterLink> {
    let mut tx = db.pool().begin().await?;

    let current: Option<Option<String>> =
        sqlx::query_scalar("SELECT cluster_id FROM articles WHERE id = ?1")
            .bind(matched.id)
            .fetch_optional(&mut *tx)
            .await?;

    let link = match current {
        None => return Err(anyhow!("matched article {} no longer exists", matched.id)),
        Some(Some(existing)) => {
            join_in_tx(&mut tx, &existing, candidate_id, now).await?;
            info!(
                "Article {} matched {} which was clustered concurrently; joined {}",
                candidate_id, matched.id, existing
            );
            ClusterLink::Joined(existing)
        }
        Some(None) => {
            let cluster_id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO article_clusters
                (id, main_article_id, title, article_count, first_seen_at, last_updated_at)
                VALUES (?1, ?2, ?3, 2, ?4, ?5)
                "#,
            )
            .bind(&cluster_id)
            .bind(matched.id)
            .bind(candidate_title)
            .bind(to_db_time(&matched.published_at))
            .bind(to_db_time(&now))
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE articles SET cluster_id = ?1 WHERE id IN (?2, ?3)")
                .bind(&cluster_id)
                .bind(matched.id)
                .bind(candidate_id)
                .execute(&mut *tx)
                .await?;

            debug!(
                "Created cluster {} for articles {} and {}",
                cluster_id, matched.id, candidate_id
            );
            ClusterLink::Created(cluster_id)
        }
    };

    tx.commit().await?;
    Ok(link)
}

fn cluster_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ArticleCluster> {
    let first_seen_at: String = row.try_get("first_seen_at")?;
    let last_updated_at: String = row.try_get("last_updated_at")?;
    Ok(ArticleCluster {
        id: row.try_get("id")?,
        main_article_id: row.try_get("main_article_id")?,
        title: row.try_get("title")?,
        article_count: row.try_get("article_count")?,
        first_seen_at: parse_db_time(&first_seen_at)?,
        last_updated_at: parse_db_time(&last_updated_at)?,
    })
}

/// Fetches a single cluster record
pub async fn get_cluster(db: &Database, cluster_id: &str) -> Result<Option<ArticleCluster>> {
    let row = sqlx::query(
        r#"
        SELECT id, main_article_id, title, article_count, first_seen_at, last_updated_at
        FROM article_clusters
        WHERE id = ?1
        "#,
    )
    .bind(cluster_id)
    .fetch_optional(db.pool())
    .await?;

    row.as_ref().map(cluster_from_row).transpose()
}

/// Most recently updated clusters first
pub async fn list_clusters(db: &Database, limit: i64) -> Result<Vec<ArticleCluster>> {
    let rows = sqlx::query(
        r#"
        SELECT id, main_article_id, title, article_count, first_seen_at, last_updated_at
        FROM article_clusters
        ORDER BY last_updated_at DESC
        LIMIT ?1
        "#,
    )
    .bind(limit)
    .fetch_all(db.pool())
    .await?;

    rows.iter().map(cluster_from_row).collect()
}

/// Member articles of a cluster, earliest first
pub async fn cluster_members(db: &Database, cluster_id: &str) -> Result<Vec<Article>> {
    let query = format!(
        "SELECT {} FROM articles WHERE cluster_id = ?1 ORDER BY published_at ASC, id ASC",
        ARTICLE_COLUMNS
    );
    let rows = sqlx::query(&query)
        .bind(cluster_id)
        .fetch_all(db.pool())
        .await?;

    Ok(rows
        .iter()
        .map(article_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

/// Rewrites `article_count` wherever it disagrees with actual membership.
///
/// # Returns
/// * `Ok(n)` - Number of clusters whose count was corrected
pub async fn reconcile_cluster_counts(db: &Database) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE article_clusters
        SET article_count = (
            SELECT COUNT(*) FROM articles WHERE articles.cluster_id = article_clusters.id
        )
        WHERE article_count != (
            SELECT COUNT(*) FROM articles WHERE articles.cluster_id = article_clusters.id
        )
        "#,
    )
    .execute(db.pool())
    .await?;

    Ok(result.rows_affected())
}
