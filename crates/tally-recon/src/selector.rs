//! Best-match selection over a candidate column.
//!
//! For one query value, every master candidate is scored with both
//! similarity measures and a single candidate is selected under a fixed,
//! reproducible tie-break policy. There is no "no match" outcome for a
//! non-empty candidate sequence; low scores signal low confidence to
//! downstream consumers instead.

use serde::{Deserialize, Serialize};

use crate::similarity::{full_ratio, partial_ratio};

/// Score above which a full-ratio match is considered confident.
pub const FULL_MATCH_THRESHOLD: u8 = 90;

/// Score above which a partial-ratio match is considered confident.
pub const PARTIAL_MATCH_THRESHOLD: u8 = 90;

/// Confidence band of a selected match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    /// Some candidate's full ratio cleared [`FULL_MATCH_THRESHOLD`].
    Full,
    /// No full-ratio hit, but the best partial ratio cleared
    /// [`PARTIAL_MATCH_THRESHOLD`].
    Partial,
    /// Neither threshold was cleared; the mapping is best-effort.
    Low,
}

/// The outcome of scanning one query value against all candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Index of the selected candidate in the original candidate order.
    pub index: usize,
    /// The selected candidate's partial ratio (the maximum over all
    /// candidates).
    pub partial: u8,
    /// The maximum full ratio observed across all candidates. Carried on
    /// the result row as reported; it is not necessarily the selected
    /// candidate's own full ratio.
    pub full: u8,
    /// Which threshold, if any, the scan cleared.
    pub confidence: MatchConfidence,
}

/// Scans every candidate and selects the best match for `query`.
///
/// Selection policy, applied in order:
///
/// 1. if the maximum full ratio exceeds [`FULL_MATCH_THRESHOLD`], select
///    the candidate with the maximum partial ratio;
/// 2. else if the maximum partial ratio exceeds
///    [`PARTIAL_MATCH_THRESHOLD`], select that candidate;
/// 3. else select the maximum-partial candidate anyway (low confidence).
///
/// Every rule selects the stable argmax of the partial ratio: ties resolve
/// to the earliest candidate, deterministically across runs. Returns
/// `None` only when `candidates` is empty.
#[must_use]
pub fn select_match<S: AsRef<str>>(query: &str, candidates: &[S]) -> Option<Match> {
    if candidates.is_empty() {
        return None;
    }

    let mut best_index = 0;
    let mut best_partial = 0;
    let mut max_full = 0;

    for (index, candidate) in candidates.iter().enumerate() {
        let candidate = candidate.as_ref();
        let partial = partial_ratio(query, candidate);
        let full = full_ratio(query, candidate);

        if partial > best_partial {
            best_partial = partial;
            best_index = index;
        }
        if full > max_full {
            max_full = full;
        }
    }

    let confidence = if max_full > FULL_MATCH_THRESHOLD {
        MatchConfidence::Full
    } else if best_partial > PARTIAL_MATCH_THRESHOLD {
        MatchConfidence::Partial
    } else {
        MatchConfidence::Low
    };

    Some(Match {
        index: best_index,
        partial: best_partial,
        full: max_full,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_candidates_yield_none() {
        let candidates: Vec<String> = vec![];
        assert!(select_match("anything", &candidates).is_none());
    }

    #[test]
    fn selection_is_always_in_bounds() {
        let candidates = vec!["alpha", "beta", "gamma"];
        for query in ["alpha", "delta", "", "zzzz"] {
            let m = select_match(query, &candidates).unwrap();
            assert!(m.index < candidates.len());
        }
    }

    #[test]
    fn full_threshold_selects_by_max_partial() {
        // The first candidate clears the full threshold against the query
        // (one substitution over 16 characters), but "ACME" holds the
        // maximum partial ratio and is selected.
        let candidates = vec!["ACME Corporatian", "ACME"];
        let m = select_match("ACME Corporation", &candidates).unwrap();

        assert_eq!(m.confidence, MatchConfidence::Full);
        assert_eq!(m.index, 1, "max-partial candidate wins under rule 1");
        assert_eq!(m.partial, 100);
        assert!(m.full > FULL_MATCH_THRESHOLD);
    }

    #[test]
    fn no_threshold_still_selects_a_candidate() {
        let candidates = vec!["one", "two", "three"];
        let m = select_match("qqqqqq", &candidates).unwrap();
        assert_eq!(m.confidence, MatchConfidence::Low);
        assert!(m.index < candidates.len());
    }

    #[test]
    fn ties_resolve_to_the_first_candidate() {
        // Identical candidates tie on every measure.
        let candidates = vec!["match", "match", "match"];
        let m = select_match("match", &candidates).unwrap();
        assert_eq!(m.index, 0);

        // Deterministic across repeated runs.
        for _ in 0..10 {
            assert_eq!(select_match("match", &candidates).unwrap().index, 0);
        }
    }

    #[test]
    fn empty_query_scores_zero_and_selects_first() {
        let candidates = vec!["alpha", "beta"];
        let m = select_match("", &candidates).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.partial, 0);
        assert_eq!(m.full, 0);
        assert_eq!(m.confidence, MatchConfidence::Low);
    }

    #[test]
    fn reported_full_is_the_maximum_over_all_candidates() {
        // The selected candidate ("ACME") has a low full ratio; the
        // reported full score comes from the other candidate.
        let candidates = vec!["ACME Corporatian", "ACME"];
        let m = select_match("ACME Corporation", &candidates).unwrap();
        assert_eq!(m.index, 1);
        assert!(m.full > full_ratio("ACME Corporation", "ACME"));
    }
}
