use std::collections::HashSet;
use tracing::debug;

use super::similarity::{BigramDice, SimilarityScorer};
use super::types::Article;
use crate::config::FeedFilterConfig;
use crate::db::Database;
use crate::TARGET_DEDUP;

/// Greedy first-wins pruning of a recency-ordered article list.
///
/// An article is dropped when its cluster was already shown, or when its
/// normalized title scores at or above the threshold against any accepted
/// title. The input order is trusted as-is; output stops at `page_size`.
pub fn filter_feed(
    articles: Vec<Article>,
    page_size: usize,
    config: &FeedFilterConfig,
) -> Vec<Article> {
    filter_feed_with(articles, page_size, config, &BigramDice)
}

pub fn filter_feed_with<S: SimilarityScorer>(
    articles: Vec<Article>,
    page_size: usize,
    config: &FeedFilterConfig,
    scorer: &S,
) -> Vec<Article> {
    let mut shown_clusters: HashSet<String> = HashSet::new();
    let mut accepted_titles: Vec<String> = Vec::new();
    let mut output = Vec::with_capacity(page_size);

    for article in articles {
        if output.len() >= page_size {
            break;
        }

        if let Some(cluster_id) = &article.cluster_id {
            if shown_clusters.contains(cluster_id) {
                debug!(target: TARGET_DEDUP, "Feed skips article {}: cluster {} already shown", article.id, cluster_id);
                continue;
            }
        }

        let near_duplicate = accepted_titles.iter().any(|accepted| {
            scorer.score(&article.title_normalized, accepted) >= config.similarity_threshold
        });
        if near_duplicate {
            debug!(target: TARGET_DEDUP, "Feed skips article {}: similar title already shown", article.id);
            continue;
        }

        if let Some(cluster_id) = &article.cluster_id {
            shown_clusters.insert(cluster_id.clone());
        }
        if !article.title_normalized.is_empty() {
            accepted_titles.push(article.title_normalized.clone());
        }
        output.push(article);
    }

    output
}

/// Loads the newest articles, over-fetching by the configured multiplier, and
/// returns at most `page_size` of them with near-duplicates removed.
pub async fn load_feed(
    db: &Database,
    config: &FeedFilterConfig,
    page_size: usize,
) -> Result<Vec<Article>, sqlx::Error> {
    let pool_size = page_size.saturating_mul(config.candidate_multiplier.max(1));
    let candidates = db.latest_articles(pool_size as i64).await?;
    let fetched = candidates.len();
    let feed = filter_feed(candidates, page_size, config);
    debug!(
        target: TARGET_DEDUP,
        "Feed built {} of {} requested from {} candidates", feed.len(), page_size, fetched
    );
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::normalizer::normalize_title;
    use chrono::{TimeZone, Utc};

    fn article(id: i64, title: &str, minute: u32, cluster: Option<&str>) -> Article {
        Article {
            id,
            source_id: "rthk".to_string(),
            title: title.to_string(),
            title_normalized: normalize_title(title),
            content: String::new(),
            summary: None,
            content_hash: format!("hash-{}", id),
            source_url: format!("https://example.com/{}", id),
            published_at: Utc.with_ymd_and_hms(2026, 9, 1, 10, minute, 0).unwrap(),
            cluster_id: cluster.map(str::to_string),
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

    fn ids(articles: &[Article]) -> Vec<i64> {
        articles.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_same_cluster_keeps_first_in_order() {
        let a = article(1, "Typhoon signal No. 8 issued", 0, Some("c1"));
        let b = article(2, "8號風球生效", 5, Some("c1"));
        let feed = filter_feed(vec![a, b], 10, &FeedFilterConfig::default());
        assert_eq!(ids(&feed), vec![1]);
    }

    #[test]
    fn test_similar_titles_across_unmerged_clusters() {
        let feed = filter_feed(
            vec![
                article(1, "MTR East Rail line suspended", 30, Some("c1")),
                article(2, "MTR East Rail line suspended again", 20, Some("c2")),
                article(3, "Hang Seng index closes higher", 10, None),
            ],
            10,
            &FeedFilterConfig::default(),
        );
        assert_eq!(ids(&feed), vec![1, 3]);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let config = FeedFilterConfig::default();
        let items = vec![article(1, "first", 2, None), article(2, "second", 1, None)];
        let feed = filter_feed_with(items.clone(), 10, &config, &FixedScorer(0.40));
        assert_eq!(ids(&feed), vec![1]);

        let feed = filter_feed_with(items, 10, &config, &FixedScorer(0.399));
        assert_eq!(ids(&feed), vec![1, 2]);
    }

    #[test]
    fn test_stops_at_page_size() {
        let feed = filter_feed(
            vec![
                article(1, "Legislative council passes budget", 40, None),
                article(2, "Airport runway reopens after storm", 30, None),
                article(3, "New ferry route to Lantau announced", 20, None),
            ],
            2,
            &FeedFilterConfig::default(),
        );
        assert_eq!(ids(&feed), vec![1, 2]);
        let none = filter_feed(
            vec![article(4, "x", 0, None)],
            0,
            &FeedFilterConfig::default(),
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_empty_titles_do_not_suppress_each_other() {
        let feed = filter_feed(
            vec![article(1, "", 2, None), article(2, "「」", 1, None)],
            10,
            &FeedFilterConfig::default(),
        );
        assert_eq!(ids(&feed), vec![1, 2]);
    }
}
