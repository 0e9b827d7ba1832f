use std::collections::HashMap;

/// Symmetric similarity in `[0, 1]` between two normalized strings.
///
/// Implementations must return 0.0 when either side is empty.
pub trait SimilarityScorer {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Dice coefficient over character-bigram multisets.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigramDice;

impl SimilarityScorer for BigramDice {
    fn score(&self, a: &str, b: &str) -> f64 {
        bigram_similarity(a, b)
    }
}

fn bigrams(s: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = s.chars().collect();
    let mut counts = HashMap::new();
    for pair in chars.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// `2 * |A ∩ B| / (|A| + |B|)` over the bigram multisets of `a` and `b`.
///
/// Strings shorter than two characters compare by equality. Empty input never
/// matches anything, including another empty string.
pub fn bigram_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a < 2 || len_b < 2 {
        return 0.0;
    }

    // Iterate the smaller map; the intersection is symmetric either way
    let (small, large) = {
        let (x, y) = (bigrams(a), bigrams(b));
        if x.len() <= y.len() {
            (x, y)
        } else {
            (y, x)
        }
    };

    let intersection: usize = small
        .iter()
        .map(|(pair, count)| (*count).min(large.get(pair).copied().unwrap_or(0)))
        .sum();

    let total = (len_a - 1) + (len_b - 1);
    2.0 * intersection as f64 / total as f64
}
