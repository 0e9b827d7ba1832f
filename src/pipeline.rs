//! Ingestion batches.
//!
//! Candidates from one outlet are classified and written strictly in order,
//! re-reading the history window before each one so later items see earlier
//! writes from the same batch. Different outlets run concurrently; their
//! windows may miss each other's in-flight writes, which the read-time filter
//! and the count reconciliation sweep absorb.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clustering::assign_to_cluster;
use crate::db::Database;
use crate::dedup::similarity::SimilarityScorer;
use crate::dedup::types::{Article, CandidateArticle, DuplicateCheckResult, OutletBatch};
use crate::dedup::DuplicateClassifier;
use crate::TARGET_INGEST;

/// Per-outlet tally of what happened to each candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub source_id: String,
    pub candidates: usize,
    pub inserted: usize,
    pub exact_duplicates: usize,
    /// Rejected by the store's `(source_id, external_id)` uniqueness.
    pub already_stored: usize,
    pub clustered: usize,
    /// Stored standalone because the cluster write failed.
    pub cluster_failures: usize,
}

/// Loads the history window ending at `now`. Failure is fatal for the batch.
async fn load_history<S: SimilarityScorer>(
    db: &Database,
    classifier: &DuplicateClassifier<S>,
    now: DateTime<Utc>,
) -> Result<Vec<Article>> {
    let since = now - classifier.config().history_window;
    db.history_window(since)
        .await
        .context("failed to load history window")
}

/// Classifies a candidate against the live history window without writing.
pub async fn check_candidate<S: SimilarityScorer>(
    db: &Database,
    classifier: &DuplicateClassifier<S>,
    candidate: &CandidateArticle,
    now: DateTime<Utc>,
) -> Result<DuplicateCheckResult> {
    let history = load_history(db, classifier, now).await?;
    Ok(classifier.classify(candidate, &history))
}

/// Ingests one outlet's candidates sequentially.
pub async fn ingest_batch<S: SimilarityScorer>(
    db: &Database,
    classifier: &DuplicateClassifier<S>,
    batch: &OutletBatch,
    now: DateTime<Utc>,
) -> Result<BatchReport> {
    let mut report = BatchReport {
        source_id: batch.source_id.clone(),
        candidates: batch.articles.len(),
        ..BatchReport::default()
    };
    info!(target: TARGET_INGEST, "Ingesting {} candidates from {}", batch.articles.len(), batch.source_id);

    for candidate in &batch.articles {
        let history = match load_history(db, classifier, now).await {
            Ok(history) => history,
            Err(e) => {
                error!(target: TARGET_INGEST, "Aborting batch for {}: {:#}", batch.source_id, e);
                return Err(e);
            }
        };

        let result = classifier.classify(candidate, &history);
        if result.is_duplicate {
            debug!(
                target: TARGET_INGEST,
                "Skipping {} ({}) matching article {:?}",
                candidate.source_url, result.match_type, result.matched_article_id
            );
            report.exact_duplicates += 1;
            continue;
        }

        let article_id = db
            .insert_article(&batch.source_id, candidate)
            .await
            .with_context(|| format!("failed to store {}", candidate.source_url))?;
        let article_id = match article_id {
            Some(id) => id,
            None => {
                report.already_stored += 1;
                continue;
            }
        };
        report.inserted += 1;

        if !result.match_type.is_similar() {
            continue;
        }

        let matched = match result
            .matched_article_id
            .and_then(|id| history.iter().find(|a| a.id == id))
        {
            Some(matched) => matched,
            None => continue,
        };

        match assign_to_cluster(db, &result, matched, article_id, &candidate.title, now).await {
            Ok(Some(link)) => {
                debug!(
                    target: TARGET_INGEST,
                    "Article {} linked to cluster {} ({}, {:.3})",
                    article_id, link.cluster_id(), result.match_type, result.similarity_score
                );
                report.clustered += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    target: TARGET_INGEST,
                    "Cluster link failed for article {}, keeping it standalone: {:#}", article_id, e
                );
                report.cluster_failures += 1;
            }
        }
    }

    info!(
        target: TARGET_INGEST,
        "{}: {} inserted, {} exact duplicates, {} already stored, {} clustered, {} cluster failures",
        report.source_id,
        report.inserted,
        report.exact_duplicates,
        report.already_stored,
        report.clustered,
        report.cluster_failures
    );
    Ok(report)
}

/// Runs one batch per outlet concurrently. One result per batch, in order;
/// a failed outlet does not stop the others.
pub async fn ingest_outlets<S: SimilarityScorer>(
    db: &Database,
    classifier: &DuplicateClassifier<S>,
    batches: &[OutletBatch],
    now: DateTime<Utc>,
) -> Vec<Result<BatchReport>> {
    join_all(
        batches
            .iter()
            .map(|batch| ingest_batch(db, classifier, batch, now)),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::get_cluster;
    use crate::config::{ClassifierConfig, FeedFilterConfig};
    use crate::dedup::feed::filter_feed;
    use crate::dedup::types::MatchType;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, hour, minute, 0).unwrap()
    }

    fn candidate(title: &str, content: &str, url: &str, published_at: DateTime<Utc>) -> CandidateArticle {
        CandidateArticle {
            external_id: None,
            title: title.to_string(),
            content: content.to_string(),
            summary: None,
            source_url: url.to_string(),
            published_at,
        }
    }

    fn batch(source_id: &str, articles: Vec<CandidateArticle>) -> OutletBatch {
        OutletBatch {
            source_id: source_id.to_string(),
            articles,
        }
    }

    struct FixedScorer(f64);

    impl SimilarityScorer for FixedScorer {
        fn score(&self, a: &str, b: &str) -> f64 {
            if a.is_empty() || b.is_empty() {
                0.0
            } else {
                self.0
            }
        }
    }

    #[tokio::test]
    async fn test_cross_outlet_typhoon_report_forms_cluster() {
        let db = Database::in_memory().await.unwrap();
        let classifier =
            DuplicateClassifier::with_scorer(ClassifierConfig::default(), FixedScorer(0.65));

        let a = candidate(
            "Typhoon signal No. 8 issued",
            "The Observatory has issued the No. 8 signal.",
            "https://outlet-a.example/typhoon",
            at(10, 0),
        );
        let report = ingest_batch(&db, &classifier, &batch("outlet-a", vec![a]), at(10, 0))
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.clustered, 0);

        let b = candidate(
            "8號風球生效",
            "天文台發出八號烈風或暴風信號。",
            "https://outlet-b.example/typhoon",
            at(10, 5),
        );
        let result = check_candidate(&db, &classifier, &b, at(10, 5)).await.unwrap();
        assert_eq!(result.match_type, MatchType::SimilarTitle);
        assert_eq!(result.similarity_score, 0.65);

        let report = ingest_batch(&db, &classifier, &batch("outlet-b", vec![b]), at(10, 5))
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.clustered, 1);

        let articles = db.latest_articles(10).await.unwrap();
        assert_eq!(articles.len(), 2);
        let cluster_id = articles[0].cluster_id.clone().unwrap();
        assert_eq!(articles[1].cluster_id.as_deref(), Some(cluster_id.as_str()));

        let cluster = get_cluster(&db, &cluster_id).await.unwrap().unwrap();
        assert_eq!(cluster.article_count, 2);
        assert_eq!(cluster.main_article_id, articles[1].id);
    }

    #[tokio::test]
    async fn test_exact_duplicates_are_not_stored() {
        let db = Database::in_memory().await.unwrap();
        let classifier = DuplicateClassifier::new(ClassifierConfig::default());
        let original = candidate(
            "Legislative council passes budget",
            "The budget passed 60 votes to 10.",
            "https://rthk.example/budget",
            at(9, 0),
        );
        ingest_batch(&db, &classifier, &batch("rthk", vec![original.clone()]), at(9, 0))
            .await
            .unwrap();

        // Same URL, wildly different title
        let same_url = candidate("Weather", "Sunny", "https://rthk.example/budget", at(9, 30));
        // Syndicated wire copy under a different URL
        let wire_copy = candidate(
            "Legislative council passes budget",
            "The budget passed 60 votes to 10.",
            "https://scmp.example/wire/budget",
            at(9, 45),
        );
        let report = ingest_batch(
            &db,
            &classifier,
            &batch("scmp", vec![same_url, wire_copy]),
            at(10, 0),
        )
        .await
        .unwrap();

        assert_eq!(report.exact_duplicates, 2);
        assert_eq!(report.inserted, 0);
        assert_eq!(db.collect_stats().await.unwrap().articles, 1);
    }

    #[tokio::test]
    async fn test_correction_in_same_batch_is_clustered() {
        let db = Database::in_memory().await.unwrap();
        let classifier = DuplicateClassifier::new(ClassifierConfig::default());
        let report = ingest_batch(
            &db,
            &classifier,
            &batch(
                "hk01",
                vec![
                    candidate(
                        "MTR East Rail line suspended after power fault",
                        "Services halted.",
                        "https://hk01.example/1",
                        at(8, 0),
                    ),
                    candidate(
                        "MTR East Rail line suspended after power fault (corrected)",
                        "Services halted between two stations.",
                        "https://hk01.example/2",
                        at(8, 5),
                    ),
                ],
            ),
            at(8, 10),
        )
        .await
        .unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.clustered, 1);
        assert_eq!(db.collect_stats().await.unwrap().clusters, 1);
    }

    #[tokio::test]
    async fn test_history_window_excludes_old_articles() {
        let db = Database::in_memory().await.unwrap();
        let classifier = DuplicateClassifier::new(ClassifierConfig::default());
        let title = "Harbour fireworks cancelled due to weather";
        ingest_batch(
            &db,
            &classifier,
            &batch("rthk", vec![candidate(title, "Old story.", "https://rthk.example/old", at(1, 0))]),
            at(1, 0),
        )
        .await
        .unwrap();

        // Three days later the same headline is unrelated news
        let later = at(1, 0) + chrono::Duration::hours(72);
        let fresh = candidate(title, "New story.", "https://rthk.example/new", later);
        let result = check_candidate(&db, &classifier, &fresh, later).await.unwrap();
        assert_eq!(result.match_type, MatchType::None);
    }

    #[tokio::test]
    async fn test_cluster_write_failure_keeps_article() {
        let db = Database::in_memory().await.unwrap();
        let classifier = DuplicateClassifier::new(ClassifierConfig::default());
        ingest_batch(
            &db,
            &classifier,
            &batch(
                "rthk",
                vec![candidate("Ferry pier fire in Central", "a", "https://rthk.example/fire", at(7, 0))],
            ),
            at(7, 0),
        )
        .await
        .unwrap();

        sqlx::query("DROP TABLE article_clusters")
            .execute(db.pool())
            .await
            .unwrap();

        let report = ingest_batch(
            &db,
            &classifier,
            &batch(
                "hk01",
                vec![candidate("Ferry pier fire in Central district", "b", "https://hk01.example/fire", at(7, 5))],
            ),
            at(7, 5),
        )
        .await
        .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.clustered, 0);
        assert_eq!(report.cluster_failures, 1);
        let articles = db.latest_articles(10).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert!(articles.iter().all(|a| a.cluster_id.is_none()));
    }

    #[tokio::test]
    async fn test_history_failure_aborts_batch() {
        let db = Database::in_memory().await.unwrap();
        let classifier = DuplicateClassifier::new(ClassifierConfig::default());
        sqlx::query("DROP TABLE articles")
            .execute(db.pool())
            .await
            .unwrap();

        let result = ingest_batch(
            &db,
            &classifier,
            &batch("rthk", vec![candidate("Anything", "a", "https://rthk.example/x", at(7, 0))]),
            at(7, 0),
        )
        .await;
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("failed to load history window"));
    }

    #[tokio::test]
    async fn test_storage_layer_duplicate_counted() {
        let db = Database::in_memory().await.unwrap();
        let classifier = DuplicateClassifier::new(ClassifierConfig::default());
        let mut first = candidate("Budget passed", "a", "https://rthk.example/a", at(6, 0));
        first.external_id = Some("story-42".to_string());
        let mut rescraped = candidate("Totally different wording", "b", "https://rthk.example/b", at(6, 1));
        rescraped.external_id = Some("story-42".to_string());

        let report = ingest_batch(&db, &classifier, &batch("rthk", vec![first, rescraped]), at(6, 5))
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.already_stored, 1);
    }

    #[tokio::test]
    async fn test_outlets_run_independently() {
        let db = Database::in_memory().await.unwrap();
        let classifier = DuplicateClassifier::new(ClassifierConfig::default());
        let batches = vec![
            batch(
                "rthk",
                vec![candidate("Airport runway reopens", "a", "https://rthk.example/r", at(5, 0))],
            ),
            batch(
                "scmp",
                vec![candidate("Hang Seng index closes higher", "b", "https://scmp.example/h", at(5, 1))],
            ),
        ];

        let results = ingest_outlets(&db, &classifier, &batches, at(5, 10)).await;
        assert_eq!(results.len(), 2);
        for (result, expected) in results.into_iter().zip(["rthk", "scmp"]) {
            let report = result.unwrap();
            assert_eq!(report.source_id, expected);
            assert_eq!(report.inserted, 1);
        }

        let feed = filter_feed(
            db.latest_articles(10).await.unwrap(),
            10,
            &FeedFilterConfig::default(),
        );
        assert_eq!(feed.len(), 2);
    }
}
