use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument};

use super::core::{parse_db_time, to_db_time, Database, DbLockErrorExt};
use crate::dedup::fingerprint::content_fingerprint;
use crate::dedup::normalizer::normalize_title;
use crate::dedup::types::{Article, CandidateArticle};
use crate::TARGET_DB;

pub(crate) const ARTICLE_COLUMNS: &str = "id, source_id, title, title_normalized, content, summary, \
     content_hash, source_url, published_at, cluster_id";

/// Maps an `articles` row, filling derived fields that legacy rows left null.
pub(crate) fn article_from_row(row: &SqliteRow) -> Result<Article, sqlx::Error> {
    let title: String = row.try_get("title")?;
    let content: String = row.try_get("content")?;
    let summary: Option<String> = row.try_get("summary")?;
    let title_normalized = row
        .try_get::<Option<String>, _>("title_normalized")?
        .unwrap_or_else(|| normalize_title(&title));
    let content_hash = row
        .try_get::<Option<String>, _>("content_hash")?
        .unwrap_or_else(|| content_fingerprint(&title, &content, summary.as_deref()));
    let published_at: String = row.try_get("published_at")?;

    Ok(Article {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        title,
        title_normalized,
        content,
        summary,
        content_hash,
        source_url: row.try_get("source_url")?,
        published_at: parse_db_time(&published_at)?,
        cluster_id: row.try_get("cluster_id")?,
    })
}

impl Database {
    /// Inserts a candidate unless `(source_id, external_id)` is already stored.
    ///
    /// Returns `Ok(None)` when the row already existed; derived fields are
    /// computed here so they always match the stored title and body.
    #[instrument(target = "db", level = "info", skip(self, candidate), fields(url = %candidate.source_url))]
    pub async fn insert_article(
        &self,
        source_id: &str,
        candidate: &CandidateArticle,
    ) -> Result<Option<i64>, sqlx::Error> {
        let title_normalized = normalize_title(&candidate.title);
        let content_hash = content_fingerprint(
            &candidate.title,
            &candidate.content,
            candidate.summary.as_deref(),
        );
        let published_at = to_db_time(&candidate.published_at);
        let created_at = to_db_time(&Utc::now());
        debug!(target: TARGET_DB, "Adding article: {}", candidate.source_url);

        let mut backoff = 100; // initial delay in milliseconds
        let max_retries = 5;

        for attempt in 1..=max_retries {
            match sqlx::query_as::<_, (i64,)>(
                r#"
                INSERT INTO articles (source_id, external_id, title, title_normalized, content, summary, content_hash, source_url, published_at, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(source_id, external_id) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(source_id)
            .bind(candidate.external_id())
            .bind(&candidate.title)
            .bind(&title_normalized)
            .bind(&candidate.content)
            .bind(&candidate.summary)
            .bind(&content_hash)
            .bind(&candidate.source_url)
            .bind(&published_at)
            .bind(&created_at)
            .fetch_optional(self.pool())
            .await
            {
                Ok(Some((id,))) => {
                    debug!(target: TARGET_DB, "Article added: {} with id {}", candidate.source_url, id);
                    return Ok(Some(id));
                }
                Ok(None) => {
                    debug!(target: TARGET_DB, "Article already stored: {}/{}", source_id, candidate.external_id());
                    return Ok(None);
                }
                Err(err) => {
                    if err.is_database_lock_error() {
                        info!(target: TARGET_DB, "Database is locked, waiting {}ms before retrying attempt {}/{}: {}", backoff, attempt, max_retries, candidate.source_url);
                        sleep(Duration::from_millis(backoff)).await;
                        backoff = backoff.saturating_mul(2); // exponential backoff
                        if attempt == max_retries {
                            // Introduce some randomness to avoid the "thundering herd problem"
                            let random_jitter = rand::rng().random_range(0..200);
                            backoff += random_jitter;
                            sleep(Duration::from_millis(backoff)).await;
                        }
                    } else {
                        error!(target: TARGET_DB, "Failed to add article: {}", err);
                        return Err(err);
                    }
                }
            }
        }

        Err(sqlx::Error::Protocol(
            "Maximum retries exceeded for adding article".into(),
        ))
    }

    /// All articles published at or after `since`, most recent first.
    #[instrument(target = "db", level = "debug", skip(self))]
    pub async fn history_window(&self, since: DateTime<Utc>) -> Result<Vec<Article>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM articles WHERE published_at >= ?1 ORDER BY published_at DESC, id DESC",
            ARTICLE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(to_db_time(&since))
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(article_from_row).collect()
    }

    /// Newest articles first, used as the feed candidate pool.
    pub async fn latest_articles(&self, limit: i64) -> Result<Vec<Article>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM articles ORDER BY published_at DESC, id DESC LIMIT ?1",
            ARTICLE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(article_from_row).collect()
    }

    /// One page of the admin listing, newest first. Pages start at 1 and
    /// hold at least one row.
    pub async fn articles_page(&self, page: i64, per_page: i64) -> Result<Vec<Article>, sqlx::Error> {
        let per_page = per_page.max(1);
        let offset = (page.max(1) - 1).saturating_mul(per_page);
        let query = format!(
            "SELECT {} FROM articles ORDER BY published_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            ARTICLE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(per_page)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(article_from_row).collect()
    }

    pub async fn get_article(&self, article_id: i64) -> Result<Option<Article>, sqlx::Error> {
        let query = format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(article_id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(article_from_row).transpose()
    }

    /// Recomputes `title_normalized` and `content_hash` wherever the stored
    /// value is missing or stale. Returns the number of rows rewritten.
    #[instrument(target = "db", level = "info", skip(self))]
    pub async fn backfill_derived_fields(&self) -> Result<u64, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, title, title_normalized, content, summary, content_hash FROM articles",
        )
        .fetch_all(self.pool())
        .await?;

        let mut updated = 0;
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let title: String = row.try_get("title")?;
            let content: String = row.try_get("content")?;
            let summary: Option<String> = row.try_get("summary")?;
            let stored_title: Option<String> = row.try_get("title_normalized")?;
            let stored_hash: Option<String> = row.try_get("content_hash")?;

            let title_normalized = normalize_title(&title);
            let content_hash = content_fingerprint(&title, &content, summary.as_deref());
            if stored_title.as_deref() == Some(title_normalized.as_str())
                && stored_hash.as_deref() == Some(content_hash.as_str())
            {
                continue;
            }

            sqlx::query("UPDATE articles SET title_normalized = ?1, content_hash = ?2 WHERE id = ?3")
                .bind(&title_normalized)
                .bind(&content_hash)
                .bind(id)
                .execute(self.pool())
                .await?;
            updated += 1;
        }

        info!(target: TARGET_DB, "Backfilled derived fields on {} articles", updated);
        Ok(updated)
    }
}
