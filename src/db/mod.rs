// Re-export the Database struct and other public items
mod article;
pub mod cluster;
pub mod core;
mod schema;

// Re-export Database and essential traits
pub use self::core::{Database, DbLockErrorExt, DbStats};
