pub mod clustering;
pub mod config;
pub mod db;
pub mod dedup;
pub mod environment;
pub mod logging;
pub mod pipeline;

pub const TARGET_DB: &str = "db_query";
pub const TARGET_DEDUP: &str = "dedup";
pub const TARGET_INGEST: &str = "ingest";
