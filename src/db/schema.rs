use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                external_id TEXT NOT NULL,
                title TEXT NOT NULL,
                title_normalized TEXT,
                content TEXT NOT NULL DEFAULT '',
                summary TEXT,
                content_hash TEXT,
                source_url TEXT NOT NULL,
                published_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                cluster_id TEXT,
                UNIQUE(source_id, external_id)
            );
            CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles (published_at);
            CREATE INDEX IF NOT EXISTS idx_articles_content_hash ON articles (content_hash);
            CREATE INDEX IF NOT EXISTS idx_articles_source_url ON articles (source_url);
            CREATE INDEX IF NOT EXISTS idx_articles_cluster_id ON articles (cluster_id);

            -- Near-duplicate clusters; ids are generated by the application
            CREATE TABLE IF NOT EXISTS article_clusters (
                id TEXT PRIMARY KEY,
                main_article_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                article_count INTEGER NOT NULL,
                first_seen_at TEXT NOT NULL,
                last_updated_at TEXT NOT NULL,
                FOREIGN KEY (main_article_id) REFERENCES articles (id)
            );
            CREATE INDEX IF NOT EXISTS idx_article_clusters_last_updated_at ON article_clusters (last_updated_at);
            "#,
        )
        .execute(&mut *conn)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");

        Ok(())
    }
}
