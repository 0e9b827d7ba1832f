use anyhow::Result;
use tracing::info;

use crate::db::cluster;
use crate::db::core::Database;

/// Repairs `article_count` drift left by concurrent outlet batches
///
/// Counts are otherwise only ever incremented, so they approximate membership
/// until this sweep runs.
///
/// # Returns
/// * `Ok(n)` - Number of clusters whose count changed
pub async fn reconcile_cluster_counts(db: &Database) -> Result<u64> {
    let corrected = cluster::reconcile_cluster_counts(db).await?;
    if corrected > 0 {
        info!("Reconciled article counts on {} clusters", corrected);
    } else {
        info!("All cluster article counts are consistent");
    }
    Ok(corrected)
}
