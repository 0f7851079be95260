//! Text similarity and change-detection primitives.
//!
//! Shared by the extraction confidence scoring and the integrity checker.
//! The checksum here is deliberately a fast non-cryptographic hash: it only
//! detects drift between two copies of the same text.

/// Normalize whitespace in a string (trim and collapse runs to one space).
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token-overlap similarity between two texts, 0.0..=1.0.
///
/// `common-word-count / max(word_count_a, word_count_b)`, case-insensitive.
/// Shared words are counted once per occurrence on the rarer side, so
/// repeated words cannot inflate the score past 1.0.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let words_a = word_counts(a);
    let words_b = word_counts(b);

    let total_a: usize = words_a.values().sum();
    let total_b: usize = words_b.values().sum();

    if total_a == 0 && total_b == 0 {
        return 1.0;
    }
    if total_a == 0 || total_b == 0 {
        return 0.0;
    }

    let common: usize = words_a
        .iter()
        .filter_map(|(word, count)| words_b.get(word).map(|other| (*count).min(*other)))
        .sum();

    common as f64 / total_a.max(total_b) as f64
}

fn word_counts(s: &str) -> std::collections::HashMap<String, usize> {
    let mut counts = std::collections::HashMap::new();
    for word in s.split_whitespace() {
        *counts.entry(word.to_lowercase()).or_insert(0) += 1;
    }
    counts
}

/// FNV-1a 64-bit checksum.
///
/// Change detection only — collisions are acceptable and this must never be
/// used for anything security-relevant.
pub fn checksum64(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Coverage ratio: how much of the (whitespace-normalized) original text is
/// reproduced by the extracted field values, 0.0..=1.0.
///
/// Used as the confidence proxy for the structural strategies.
pub fn coverage_ratio<'a>(original: &str, field_values: impl Iterator<Item = &'a str>) -> f64 {
    let original_len = normalize_whitespace(original).chars().count();
    if original_len == 0 {
        return 0.0;
    }

    let covered: usize = field_values
        .map(|value| normalize_whitespace(value).chars().count())
        .sum();

    (covered as f64 / original_len as f64).min(1.0)
}
