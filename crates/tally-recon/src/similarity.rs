//! String similarity scoring.
//!
//! Two complementary measures on a 0–100 scale:
//!
//! - [`full_ratio`] — normalized Levenshtein similarity over the whole
//!   strings; 100 means identical.
//! - [`partial_ratio`] — the best full ratio achieved by sliding the
//!   shorter string across the longer one, capturing containment such as
//!   abbreviations or truncations.
//!
//! Callers always pass `(query, candidate)` in that order; the measures
//! are symmetric in intent but reproducibility requires a fixed argument
//! order. Empty values score 0 against anything.

/// Highest possible score (identical strings).
pub const MAX_SCORE: u8 = 100;

/// Whole-string similarity on a 0–100 scale.
#[must_use]
pub fn full_ratio(query: &str, candidate: &str) -> u8 {
    if query.is_empty() || candidate.is_empty() {
        return 0;
    }
    scale(strsim::normalized_levenshtein(query, candidate))
}

/// Best-aligned substring similarity on a 0–100 scale.
///
/// The shorter string is compared against every window of its own
/// character length in the longer string; the best window's full ratio is
/// returned. Equal lengths degenerate to [`full_ratio`].
#[must_use]
pub fn partial_ratio(query: &str, candidate: &str) -> u8 {
    if query.is_empty() || candidate.is_empty() {
        return 0;
    }

    let (short, long) = if query.chars().count() <= candidate.chars().count() {
        (query, candidate)
    } else {
        (candidate, query)
    };

    let short_len = short.chars().count();
    // Char-boundary byte offsets of `long`, including the end sentinel.
    let bounds: Vec<usize> = long
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(long.len()))
        .collect();
    let long_len = bounds.len() - 1;

    if short_len == long_len {
        return scale(strsim::normalized_levenshtein(short, long));
    }

    let mut best = 0.0_f64;
    for start in 0..=(long_len - short_len) {
        let window = &long[bounds[start]..bounds[start + short_len]];
        let score = strsim::normalized_levenshtein(short, window);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    scale(best)
}

fn scale(similarity: f64) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (similarity.clamp(0.0, 1.0) * f64::from(MAX_SCORE)).round() as u8
    }
}
