use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Struct representing an article cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleCluster {
    pub id: String,
    /// Earliest known member, the cluster's reference point
    pub main_article_id: i64,
    /// Representative title, fixed at creation
    pub title: String,
    pub article_count: i64,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

/// How a near-duplicate was linked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterLink {
    Joined(String),
    Created(String),
}

impl ClusterLink {
    pub fn cluster_id(&self) -> &str {
        match self {
            ClusterLink::Joined(id) | ClusterLink::Created(id) => id,
        }
    }
}
