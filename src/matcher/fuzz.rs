//! Token-aware fuzzy string similarity on a 0-100 scale.
//!
//! `weighted_ratio` picks the best of full-string, token-sort, token-set
//! and partial (substring) similarity, scaling the weaker strategies down
//! so that an exact match always wins over a partial one.

use rapidfuzz::distance::indel;
use std::collections::BTreeSet;

const UNBASE_SCALE: f64 = 0.95;

/// Lowercases, folds full-width ASCII, and turns every non-alphanumeric
/// character into a space.
pub fn default_process(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let c = match c as u32 {
            0xFF01..=0xFF5E => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            0x3000 => ' ',
            _ => c,
        };
        for lc in c.to_lowercase() {
            out.push(if lc.is_alphanumeric() { lc } else { ' ' });
        }
    }
    out.trim().to_string()
}

/// Insertion/deletion distance.
fn indel_distance(a: &[char], b: &[char]) -> usize {
    indel::distance(a.iter().copied(), b.iter().copied())
}

/// Similarity from a distance over a combined length. Integer arithmetic
/// until the final division keeps boundary scores exact.
fn normalized(total: usize, distance: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    100.0 * (total - distance) as f64 / total as f64
}

fn chars_ratio(a: &[char], b: &[char]) -> f64 {
    normalized(a.len() + b.len(), indel_distance(a, b))
}

/// Full-string similarity.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    chars_ratio(&a, &b)
}

/// Best similarity of the shorter string against any window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    let (m, n) = (short.len(), long.len());
    let mut best = 0.0f64;

    // Windows hanging off the left edge
    for i in 1..m {
        best = best.max(chars_ratio(&short, &long[..i]));
    }
    for i in 0..=(n - m) {
        best = best.max(chars_ratio(&short, &long[i..i + m]));
        if best == 100.0 {
            return best;
        }
    }
    // Windows hanging off the right edge
    for i in (n - m + 1)..n {
        best = best.max(chars_ratio(&short, &long[i..]));
    }
    best
}

fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens
}

/// Similarity after sorting the words of both strings.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

/// Similarity of the shared words plus each side's leftovers.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    // One side is a subset of the other
    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let diff_ab: Vec<char> = diff_ab.join(" ").chars().collect();
    let diff_ba: Vec<char> = diff_ba.join(" ").chars().collect();
    let (diff_ab_len, diff_ba_len) = (diff_ab.len(), diff_ba.len());
    let sect_len = intersection.join(" ").chars().count();
    let sep = usize::from(sect_len != 0);

    let sect_ab_len = sect_len + sep + diff_ab_len;
    let sect_ba_len = sect_len + sep + diff_ba_len;

    let result = normalized(
        sect_ab_len + sect_ba_len,
        indel_distance(&diff_ab, &diff_ba),
    );
    if sect_len == 0 {
        return result;
    }

    let sect_ab_ratio = normalized(sect_len + sect_ab_len, sep + diff_ab_len);
    let sect_ba_ratio = normalized(sect_len + sect_ba_len, sep + diff_ba_len);

    result.max(sect_ab_ratio).max(sect_ba_ratio)
}

/// Partial similarity over sorted words, or 100 when any word is shared.
pub fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    if tokens_a.intersection(&tokens_b).next().is_some() {
        return 100.0;
    }

    let sorted = partial_ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "));
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    sorted.max(partial_ratio(&diff_ab.join(" "), &diff_ba.join(" ")))
}

/// Composite score: the best of all strategies, weighted by how different
/// the two lengths are. Inputs are normalized with `default_process`.
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    let a = default_process(a);
    let b = default_process(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let len_a = a.chars().count() as f64;
    let len_b = b.chars().count() as f64;
    let len_ratio = len_a.max(len_b) / len_a.min(len_b);

    let end_ratio = ratio(&a, &b);
    if len_ratio < 1.5 {
        let token = token_sort_ratio(&a, &b).max(token_set_ratio(&a, &b));
        return end_ratio.max(token * UNBASE_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    let end_ratio = end_ratio.max(partial_ratio(&a, &b) * partial_scale);
    end_ratio.max(partial_token_ratio(&a, &b) * UNBASE_SCALE * partial_scale)
}
