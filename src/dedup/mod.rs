//! Cross-source near-duplicate detection.
//!
//! The leaf components (normalizer, fingerprint, similarity) are pure. The
//! classifier runs at ingestion time; the feed filter and flagger run at read
//! time over snapshots already fetched from the store.

pub mod classifier;
pub mod feed;
pub mod fingerprint;
pub mod flagger;
pub mod normalizer;
pub mod similarity;
pub mod types;

pub use types::*;

pub use classifier::DuplicateClassifier;
pub use feed::{filter_feed, load_feed};
pub use fingerprint::content_fingerprint;
pub use flagger::{flag_duplicates, load_flagged_page};
pub use normalizer::normalize_title;
pub use similarity::{bigram_similarity, BigramDice, SimilarityScorer};
