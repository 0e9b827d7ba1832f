//! Tunable thresholds and windows for the dedup engine.
//!
//! Every component takes its configuration explicitly; nothing below the
//! binaries reads the process environment on its own.

use chrono::Duration;
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::warn;

use crate::environment::{get_env_var_as_vec, get_env_var_or};

/// Rank assigned to sources missing from the priority table (lowest trust).
pub const UNRANKED_PRIORITY: u32 = u32::MAX;

pub const DEFAULT_TITLE_SIMILARITY: f64 = 0.60;
pub const DEFAULT_CONTENT_SIMILARITY: f64 = 0.50;
pub const DEFAULT_HISTORY_HOURS: i64 = 48;
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 2000;
pub const DEFAULT_FEED_SIMILARITY: f64 = 0.40;
pub const DEFAULT_FEED_CANDIDATE_MULTIPLIER: usize = 3;
pub const DEFAULT_FLAG_SIMILARITY: f64 = 0.40;
pub const DEFAULT_FLAG_WINDOW_HOURS: i64 = 6;

lazy_static! {
    // Lower rank = more trusted. Public broadcasters and official sources first.
    static ref DEFAULT_PRIORITIES: HashMap<String, u32> = {
        let mut map = HashMap::new();
        map.insert("rthk".to_string(), 1);
        map.insert("govhk".to_string(), 1);
        map.insert("scmp".to_string(), 2);
        map.insert("hkfp".to_string(), 3);
        map.insert("mingpao".to_string(), 3);
        map.insert("hk01".to_string(), 4);
        map.insert("thestandard".to_string(), 4);
        map.insert("oncc".to_string(), 5);
        map.insert("singtao".to_string(), 5);
        map
    };
}

/// Ingestion-time classifier thresholds.
#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub title_similarity: f64,
    pub content_similarity: f64,
    /// How far back the history window reaches from "now".
    pub history_window: Duration,
    /// Content is truncated to this many characters before similarity scoring.
    pub max_content_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            title_similarity: DEFAULT_TITLE_SIMILARITY,
            content_similarity: DEFAULT_CONTENT_SIMILARITY,
            history_window: Duration::hours(DEFAULT_HISTORY_HOURS),
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FeedFilterConfig {
    pub similarity_threshold: f64,
    /// The feed query over-fetches `page_size * candidate_multiplier` rows.
    pub candidate_multiplier: usize,
}

impl Default for FeedFilterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_FEED_SIMILARITY,
            candidate_multiplier: DEFAULT_FEED_CANDIDATE_MULTIPLIER,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FlaggerConfig {
    pub similarity_threshold: f64,
    /// Articles further apart than this are never paired.
    pub window: Duration,
    pub priorities: SourcePriorityTable,
}

impl Default for FlaggerConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_FLAG_SIMILARITY,
            window: Duration::hours(DEFAULT_FLAG_WINDOW_HOURS),
            priorities: SourcePriorityTable::default(),
        }
    }
}

/// Static trust ranking of outlets.
#[derive(Clone, Debug)]
pub struct SourcePriorityTable {
    ranks: HashMap<String, u32>,
}

impl Default for SourcePriorityTable {
    fn default() -> Self {
        Self {
            ranks: DEFAULT_PRIORITIES.clone(),
        }
    }
}

impl SourcePriorityTable {
    pub fn empty() -> Self {
        Self {
            ranks: HashMap::new(),
        }
    }

    pub fn with_rank(mut self, source_id: &str, rank: u32) -> Self {
        self.ranks.insert(source_id.to_lowercase(), rank);
        self
    }

    /// Rank for a source; unknown sources sort last.
    pub fn rank(&self, source_id: &str) -> u32 {
        self.ranks
            .get(&source_id.to_lowercase())
            .copied()
            .unwrap_or(UNRANKED_PRIORITY)
    }

    /// Parses `source:rank` entries, skipping malformed ones with a warning.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut table = Self::empty();
        for entry in entries {
            let entry = entry.as_ref();
            match entry.split_once(':') {
                Some((source, rank)) => match rank.trim().parse::<u32>() {
                    Ok(rank) => table = table.with_rank(source.trim(), rank),
                    Err(_) => warn!("Ignoring source priority entry with bad rank: {}", entry),
                },
                None => warn!("Ignoring malformed source priority entry: {}", entry),
            }
        }
        table
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct DedupConfig {
    pub classifier: ClassifierConfig,
    pub feed: FeedFilterConfig,
    pub flagger: FlaggerConfig,
}

impl DedupConfig {
    /// Builds a configuration from defaults, overridden by any `DEDUP_*`,
    /// `FEED_*`, `FLAG_*` and `SOURCE_PRIORITY` environment variables.
    pub fn from_env() -> Self {
        let classifier = ClassifierConfig {
            title_similarity: get_env_var_or("DEDUP_TITLE_SIMILARITY", DEFAULT_TITLE_SIMILARITY),
            content_similarity: get_env_var_or(
                "DEDUP_CONTENT_SIMILARITY",
                DEFAULT_CONTENT_SIMILARITY,
            ),
            history_window: Duration::hours(get_env_var_or(
                "DEDUP_HISTORY_HOURS",
                DEFAULT_HISTORY_HOURS,
            )),
            max_content_chars: get_env_var_or("DEDUP_MAX_CONTENT_CHARS", DEFAULT_MAX_CONTENT_CHARS),
        };

        let feed = FeedFilterConfig {
            similarity_threshold: get_env_var_or("FEED_SIMILARITY", DEFAULT_FEED_SIMILARITY),
            candidate_multiplier: get_env_var_or(
                "FEED_CANDIDATE_MULTIPLIER",
                DEFAULT_FEED_CANDIDATE_MULTIPLIER,
            )
            .max(1),
        };

        let priority_entries = get_env_var_as_vec("SOURCE_PRIORITY", ';');
        let priorities = if priority_entries.is_empty() {
            SourcePriorityTable::default()
        } else {
            SourcePriorityTable::from_entries(&priority_entries)
        };

        let flagger = FlaggerConfig {
            similarity_threshold: get_env_var_or("FLAG_SIMILARITY", DEFAULT_FLAG_SIMILARITY),
            window: Duration::hours(get_env_var_or(
                "FLAG_WINDOW_HOURS",
                DEFAULT_FLAG_WINDOW_HOURS,
            )),
            priorities,
        };

        Self {
            classifier,
            feed,
            flagger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_observed_constants() {
        let config = DedupConfig::default();
        assert_eq!(config.classifier.title_similarity, 0.60);
        assert_eq!(config.classifier.content_similarity, 0.50);
        assert_eq!(config.classifier.history_window, Duration::hours(48));
        assert_eq!(config.feed.similarity_threshold, 0.40);
        assert_eq!(config.feed.candidate_multiplier, 3);
        assert_eq!(config.flagger.similarity_threshold, 0.40);
        assert_eq!(config.flagger.window, Duration::hours(6));
    }

    #[test]
    fn test_priority_table_lookup() {
        let table = SourcePriorityTable::from_entries(&["RTHK:1", "hk01 : 5", "broken", "x:y"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rank("rthk"), 1);
        assert_eq!(table.rank("HK01"), 5);
        assert_eq!(table.rank("unknown-outlet"), UNRANKED_PRIORITY);
    }
}
