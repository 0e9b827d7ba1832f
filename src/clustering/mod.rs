// Module declarations
pub mod assignment;
pub mod reconcile;
pub mod types;

pub use types::*;

pub use assignment::assign_to_cluster;
pub use reconcile::reconcile_cluster_counts;

// Read-side helpers live next to the SQL
pub use crate::db::cluster::{cluster_members, get_cluster, list_clusters};
