use anyhow::Result;
use chrono::{DateTime, Utc};

use super::ClusterLink;
use crate::db::cluster;
use crate::db::core::Database;
use crate::dedup::types::{Article, DuplicateCheckResult};

/// Turns a near-duplicate classification into a durable cluster link
///
/// This function:
/// 1. Ignores anything that is not a `similar_title`/`similar_content` match
/// 2. Joins the matched article's cluster when it already has one
/// 3. Otherwise creates a cluster holding the matched article and the candidate
///
/// # Arguments
/// * `db` - Database instance
/// * `result` - Classifier output for the candidate
/// * `matched` - The history article the candidate matched
/// * `candidate_id` - ID the candidate was stored under
/// * `candidate_title` - Becomes the cluster title if a cluster is created
/// * `now` - Bookkeeping timestamp
///
/// # Returns
/// * `Ok(Some(link))` - The cluster the candidate now belongs to
/// * `Ok(None)` - No cluster operation applies
/// * `Err` - If the write failed; the candidate stays unclustered
pub async fn assign_to_cluster(
    db: &Database,
    result: &DuplicateCheckResult,
    matched: &Article,
    candidate_id: i64,
    candidate_title: &str,
    now: DateTime<Utc>,
) -> Result<Option<ClusterLink>> {
    if !result.match_type.is_similar() {
        return Ok(None);
    }

    let link = match matched.cluster_id.as_deref().or(result.cluster_id.as_deref()) {
        Some(cluster_id) => cluster::join_cluster(db, cluster_id, candidate_id, now).await?,
        None => cluster::create_cluster(db, matched, candidate_id, candidate_title, now).await?,
    };

    Ok(Some(link))
}
