use unicode_normalization::UnicodeNormalization;

/// Bracket and quote glyphs, Western and CJK.
const BRACKETS_AND_QUOTES: &[char] = &[
    '(', ')', '[', ']', '{', '}', '<', '>', '"', '\'', '`', '「', '」', '『', '』', '【', '】',
    '〈', '〉', '《', '》', '〔', '〕', '〖', '〗', '（', '）', '［', '］', '｛', '｝', '＜', '＞',
    '“', '”', '‘', '’', '«', '»', '‹', '›', '＂', '＇',
];

/// Sentence punctuation, Western and full-width.
const SENTENCE_PUNCTUATION: &[char] = &[
    ',', '.', ';', ':', '!', '?', '，', '。', '；', '：', '！', '？', '、', '､', '｡', '…',
];

/// Separators left dangling at either end once the rest is stripped.
const EDGE_RESIDUE: &[char] = &['-', '–', '—', '_', '|', '｜', '/', '·', '・', '~', '～', '*', '#'];

/// Canonicalizes a title into a comparison key.
///
/// NFKC folds full-width forms to their ASCII equivalents, then the title is
/// lowercased, all whitespace is removed, bracket/quote and sentence
/// punctuation is dropped, and separator residue is trimmed from both ends.
/// Stripping can bring a combining mark up against a new base character, so
/// the stripped text is composed again before trimming. The result is
/// idempotent. An empty key must never be treated as a match.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.nfkc().collect::<String>().to_lowercase();

    let stripped: String = lowered
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter(|c| !BRACKETS_AND_QUOTES.contains(c))
        .filter(|c| !SENTENCE_PUNCTUATION.contains(c))
        .collect();

    let recomposed: String = stripped.nfkc().collect();
    recomposed
        .trim_matches(|c| EDGE_RESIDUE.contains(&c))
        .to_string()
}

/// Comparison key for the body text used by content-level similarity.
///
/// Same canonical form as titles, truncated to `max_chars` characters.
pub fn normalize_content(text: &str, max_chars: usize) -> String {
    normalize_title(text).chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(
            normalize_title("Typhoon Signal No. 8 Issued!"),
            "typhoonsignalno8issued"
        );
        assert_eq!(normalize_title("  Breaking:   \"Markets\" rally  "), "breakingmarketsrally");
        assert_eq!(normalize_title("【快訊】８號風球生效。"), "快訊8號風球生效");
        assert_eq!(normalize_title("「政府」宣布，明日停課！"), "政府宣布明日停課");
    }

    #[test]
    fn test_edge_residue_trimmed() {
        assert_eq!(normalize_title("— Live updates —"), "liveupdates");
        assert_eq!(normalize_title("| HK01 |"), "hk01");
        // Inner separators are kept
        assert_eq!(normalize_title("MTR-East Rail"), "mtr-eastrail");
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("   "), "");
        assert_eq!(normalize_title("「」。，!?"), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Typhoon Signal No. 8 Issued!",
            "【快訊】８號風球生效。",
            "ΟΔΟΣ ΑΣ Β",
            "- Mixed 中英 Title: (update) -",
            "ﬁnal Ｆｕｌｌ－ｗｉｄｔｈ",
            "",
            "???",
            "e \u{301}",
            "e(\u{301}",
            "= \u{338}",
            "-\u{301}x",
        ];
        for sample in samples {
            let once = normalize_title(sample);
            assert_eq!(normalize_title(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_marks_recompose_after_stripping() {
        assert_eq!(normalize_title("e \u{301}"), "\u{e9}");
        assert_eq!(normalize_title("Cafe (\u{301})"), "caf\u{e9}");
    }

    #[test]
    fn test_content_truncation() {
        let body = "One two three. Four five six.";
        assert_eq!(normalize_content(body, 6), "onetwo");
        assert_eq!(normalize_content(body, 1000), "onetwothreefourfivesix");
    }
}
