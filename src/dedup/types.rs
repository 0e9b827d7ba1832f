use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A freshly fetched article, as handed over by a per-outlet adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateArticle {
    /// Outlet-side identifier; falls back to `source_url` when absent.
    #[serde(default)]
    pub external_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub source_url: String,
    pub published_at: DateTime<Utc>,
}

impl CandidateArticle {
    pub fn external_id(&self) -> &str {
        self.external_id.as_deref().unwrap_or(&self.source_url)
    }
}

/// One outlet's worth of candidates for a single ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutletBatch {
    pub source_id: String,
    pub articles: Vec<CandidateArticle>,
}

/// A stored article with its derived dedup fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source_id: String,
    pub title: String,
    pub title_normalized: String,
    pub content: String,
    pub summary: Option<String>,
    pub content_hash: String,
    pub source_url: String,
    pub published_at: DateTime<Utc>,
    pub cluster_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactUrl,
    ExactContent,
    SimilarTitle,
    SimilarContent,
    None,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ExactUrl => "exact_url",
            MatchType::ExactContent => "exact_content",
            MatchType::SimilarTitle => "similar_title",
            MatchType::SimilarContent => "similar_content",
            MatchType::None => "none",
        }
    }

    /// Near-duplicates are stored and linked into a cluster.
    pub fn is_similar(&self) -> bool {
        matches!(self, MatchType::SimilarTitle | MatchType::SimilarContent)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one candidate against the history window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCheckResult {
    pub is_duplicate: bool,
    pub match_type: MatchType,
    /// Zero unless `match_type` is one of the similarity matches.
    pub similarity_score: f64,
    pub matched_article_id: Option<i64>,
    pub cluster_id: Option<String>,
}

impl DuplicateCheckResult {
    pub fn none() -> Self {
        Self {
            is_duplicate: false,
            match_type: MatchType::None,
            similarity_score: 0.0,
            matched_article_id: None,
            cluster_id: None,
        }
    }

    pub fn exact(match_type: MatchType, matched_article_id: i64) -> Self {
        Self {
            is_duplicate: true,
            match_type,
            similarity_score: 0.0,
            matched_article_id: Some(matched_article_id),
            cluster_id: None,
        }
    }

    pub fn similar(match_type: MatchType, score: f64, matched: &Article) -> Self {
        Self {
            is_duplicate: false,
            match_type,
            similarity_score: score,
            matched_article_id: Some(matched.id),
            cluster_id: matched.cluster_id.clone(),
        }
    }
}

/// Admin-listing annotation for a single article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateFlag {
    pub article_id: i64,
    pub is_similar_duplicate: bool,
    pub similar_to_id: Option<i64>,
}
