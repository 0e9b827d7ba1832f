use std::cmp::Ordering;
use tracing::debug;

use super::similarity::{BigramDice, SimilarityScorer};
use super::types::{Article, DuplicateFlag};
use crate::config::FlaggerConfig;
use crate::db::Database;
use crate::TARGET_DEDUP;

/// Marks lower-priority near-duplicates within one admin page.
///
/// Returns one flag per input article, in input order.
pub fn flag_duplicates(articles: &[Article], config: &FlaggerConfig) -> Vec<DuplicateFlag> {
    flag_duplicates_with(articles, config, &BigramDice)
}

pub fn flag_duplicates_with<S: SimilarityScorer>(
    articles: &[Article],
    config: &FlaggerConfig,
    scorer: &S,
) -> Vec<DuplicateFlag> {
    // primary_of[k] = index of the article k duplicates
    let mut primary_of: Vec<Option<usize>> = vec![None; articles.len()];

    for i in 0..articles.len() {
        for j in (i + 1)..articles.len() {
            if primary_of[i].is_some() {
                break;
            }
            if primary_of[j].is_some() {
                continue;
            }
            if !is_duplicate_pair(&articles[i], &articles[j], config, scorer) {
                continue;
            }

            let (primary, duplicate) = match compare_priority(&articles[i], &articles[j], config) {
                Ordering::Greater => (j, i),
                _ => (i, j),
            };
            debug!(
                target: TARGET_DEDUP,
                "Flagging article {} as duplicate of {}", articles[duplicate].id, articles[primary].id
            );
            primary_of[duplicate] = Some(primary);

            // Anything pointing at the new duplicate follows it to its primary,
            // but only while that pair still qualifies on its own
            for k in 0..articles.len() {
                if primary_of[k] != Some(duplicate) {
                    continue;
                }
                if is_duplicate_pair(&articles[k], &articles[primary], config, scorer) {
                    primary_of[k] = Some(primary);
                } else {
                    debug!(
                        target: TARGET_DEDUP,
                        "Clearing flag on article {}: no duplicate pair with {}",
                        articles[k].id, articles[primary].id
                    );
                    primary_of[k] = None;
                }
            }
        }
    }

    articles
        .iter()
        .zip(primary_of)
        .map(|(article, primary)| DuplicateFlag {
            article_id: article.id,
            is_similar_duplicate: primary.is_some(),
            similar_to_id: primary.map(|p| articles[p].id),
        })
        .collect()
}

fn is_duplicate_pair<S: SimilarityScorer>(
    a: &Article,
    b: &Article,
    config: &FlaggerConfig,
    scorer: &S,
) -> bool {
    let gap_secs = (a.published_at - b.published_at).num_seconds().abs();
    if gap_secs > config.window.num_seconds() {
        return false;
    }

    if let (Some(ca), Some(cb)) = (&a.cluster_id, &b.cluster_id) {
        if ca == cb {
            return true;
        }
    }

    scorer.score(&a.title_normalized, &b.title_normalized) >= config.similarity_threshold
}

/// `Less` when `a` should be the primary. Lower rank wins, then the earlier
/// publication; a full tie keeps page order.
fn compare_priority(a: &Article, b: &Article, config: &FlaggerConfig) -> Ordering {
    let rank_a = config.priorities.rank(&a.source_id);
    let rank_b = config.priorities.rank(&b.source_id);
    rank_a
        .cmp(&rank_b)
        .then_with(|| a.published_at.cmp(&b.published_at))
}

/// Loads one admin page (newest first) and annotates it.
pub async fn load_flagged_page(
    db: &Database,
    config: &FlaggerConfig,
    page: i64,
    per_page: i64,
) -> Result<Vec<(Article, DuplicateFlag)>, sqlx::Error> {
    let articles = db.articles_page(page, per_page).await?;
    let flags = flag_duplicates(&articles, config);
    Ok(articles.into_iter().zip(flags).collect())
}
