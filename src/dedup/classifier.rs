use tracing::debug;

use super::fingerprint::{content_fingerprint, fingerprint_input};
use super::normalizer::{normalize_content, normalize_title};
use super::similarity::{BigramDice, SimilarityScorer};
use super::types::{Article, CandidateArticle, DuplicateCheckResult, MatchType};
use crate::config::ClassifierConfig;
use crate::TARGET_DEDUP;

/// Decides whether a candidate is an exact duplicate, a near-duplicate, or
/// novel relative to a window of recent articles.
#[derive(Debug, Clone)]
pub struct DuplicateClassifier<S = BigramDice> {
    config: ClassifierConfig,
    scorer: S,
}

impl DuplicateClassifier<BigramDice> {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            scorer: BigramDice,
        }
    }
}

impl Default for DuplicateClassifier<BigramDice> {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl<S: SimilarityScorer> DuplicateClassifier<S> {
    pub fn with_scorer(config: ClassifierConfig, scorer: S) -> Self {
        Self { config, scorer }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies `candidate` against `history`.
    ///
    /// Checks run in strict priority order and the first hit wins: exact URL,
    /// exact content fingerprint, title similarity, content similarity.
    /// `history` is expected most-recent-first; among equally scored matches
    /// the earliest entry in that ordering is chosen.
    pub fn classify(
        &self,
        candidate: &CandidateArticle,
        history: &[Article],
    ) -> DuplicateCheckResult {
        if history.is_empty() {
            return DuplicateCheckResult::none();
        }

        if !candidate.source_url.is_empty() {
            if let Some(existing) = history
                .iter()
                .find(|a| a.source_url == candidate.source_url)
            {
                debug!(
                    target: TARGET_DEDUP,
                    "Exact URL match for {} against article {}", candidate.source_url, existing.id
                );
                return DuplicateCheckResult::exact(MatchType::ExactUrl, existing.id);
            }
        }

        let fingerprint = content_fingerprint(
            &candidate.title,
            &candidate.content,
            candidate.summary.as_deref(),
        );
        if let Some(existing) = history.iter().find(|a| a.content_hash == fingerprint) {
            debug!(
                target: TARGET_DEDUP,
                "Exact content match for {} against article {}", candidate.source_url, existing.id
            );
            return DuplicateCheckResult::exact(MatchType::ExactContent, existing.id);
        }

        let title_key = normalize_title(&candidate.title);
        if let Some((matched, score)) = self.best_match(
            history,
            &title_key,
            |a| a.title_normalized.clone(),
            self.config.title_similarity,
        ) {
            debug!(
                target: TARGET_DEDUP,
                "Similar title ({:.3}) for '{}' against article {}", score, candidate.title, matched.id
            );
            return DuplicateCheckResult::similar(MatchType::SimilarTitle, score, matched);
        }

        let max_chars = self.config.max_content_chars;
        let content_key = normalize_content(
            &fingerprint_input(
                &candidate.title,
                &candidate.content,
                candidate.summary.as_deref(),
            ),
            max_chars,
        );
        if let Some((matched, score)) = self.best_match(
            history,
            &content_key,
            |a| {
                normalize_content(
                    &fingerprint_input(&a.title, &a.content, a.summary.as_deref()),
                    max_chars,
                )
            },
            self.config.content_similarity,
        ) {
            debug!(
                target: TARGET_DEDUP,
                "Similar content ({:.3}) for '{}' against article {}", score, candidate.title, matched.id
            );
            return DuplicateCheckResult::similar(MatchType::SimilarContent, score, matched);
        }

        DuplicateCheckResult::none()
    }

    /// Highest-scoring history entry at or above `threshold`. Ties keep the
    /// first entry seen. An empty key never matches.
    fn best_match<'h, F>(
        &self,
        history: &'h [Article],
        key: &str,
        key_of: F,
        threshold: f64,
    ) -> Option<(&'h Article, f64)>
    where
        F: Fn(&Article) -> String,
    {
        if key.is_empty() {
            return None;
        }

        let mut best: Option<(&Article, f64)> = None;
        for article in history {
            let other = key_of(article);
            if other.is_empty() {
                continue;
            }
            let score = self.scorer.score(key, &other);
            if score < threshold {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((article, score)),
            }
        }
        best
    }
}
