//! Scoring of one (source, target) media-type pair.
//!
//! The source is the requested media range, the target a catalog candidate.
//! Scores are recomputed per comparison and never stored.

use std::cmp::Ordering;

use crate::media_type::{parse_quality, MediaType, QUALITY_PARAMETER};
use crate::Error;

/// How many of the eligible source parameters found a counterpart in the target.
///
/// `All` is the sentinel used when neither side carries parameters; it
/// outranks any explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParameterMatch {
    /// Everything that could match did; used when neither side has parameters.
    All,
    /// The number of matched source parameters.
    Count(usize),
}

impl Ord for ParameterMatch {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ParameterMatch::All, ParameterMatch::All) => Ordering::Equal,
            (ParameterMatch::All, ParameterMatch::Count(_)) => Ordering::Greater,
            (ParameterMatch::Count(_), ParameterMatch::All) => Ordering::Less,
            (ParameterMatch::Count(a), ParameterMatch::Count(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for ParameterMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The score of matching one requested media range against one candidate.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatchScore {
    /// Type/subtype match depth: -1 no match, 0 source type wildcard,
    /// 1 subtype wildcard, 2 exact.
    depth: i8,
    matched: ParameterMatch,
    eligible: usize,
    quality: u16,
    target_parameter_count: usize,
}

impl MatchScore {
    /// Score `source` (the requested range) against `target` (the candidate).
    pub(crate) fn evaluate(source: &MediaType, target: &MediaType) -> Result<Self, Error> {
        let depth = type_name_depth(source, target);
        let target_parameter_count = target.parameters().len();

        let mut quality = 1000u16;
        let mut eligible = 0usize;
        let mut matched_count = 0usize;
        for (name, value) in source.parameters() {
            if name.eq_ignore_ascii_case(QUALITY_PARAMETER) {
                quality = parse_quality(value)?;
                break;
            }
            eligible += 1;
            let found = target
                .parameters()
                .iter()
                .any(|(tn, tv)| tn.eq_ignore_ascii_case(name) && tv == value);
            if found {
                matched_count += 1;
            }
        }

        let matched = if eligible == 0 {
            if depth == 0 || depth == 1 {
                // A wildcard range absorbs whatever parameters the target carries.
                ParameterMatch::Count(target_parameter_count)
            } else if target_parameter_count > 0 {
                ParameterMatch::Count(0)
            } else {
                ParameterMatch::All
            }
        } else {
            ParameterMatch::Count(matched_count)
        };

        Ok(Self {
            depth,
            matched,
            eligible,
            quality,
            target_parameter_count,
        })
    }

    /// A pair matches when its quality is non-zero, the names matched at some
    /// depth, and — for fully named types — every eligible source parameter
    /// found a counterpart.
    pub(crate) fn is_match(&self) -> bool {
        if self.quality == 0 || self.depth < 0 {
            return false;
        }
        if self.depth <= 1 {
            return true;
        }
        match self.matched {
            ParameterMatch::All => true,
            ParameterMatch::Count(count) => count >= self.eligible,
        }
    }

    /// Exact match: full type/subtype depth and no unmatched target parameter.
    pub(crate) fn is_exact(&self) -> bool {
        self.depth == 2
            && match self.matched {
                ParameterMatch::All => true,
                ParameterMatch::Count(count) => count == self.target_parameter_count,
            }
    }

    /// The quality value on the 0–1000 scale, defaulting to 1000.
    #[cfg(test)]
    pub(crate) fn quality(&self) -> u16 {
        self.quality
    }

    /// `true` when this score strictly outranks `other`.
    ///
    /// The preference chain: deeper type/subtype match, then exactness, then
    /// matched-parameter count, then quality. Callers break remaining ties by
    /// catalog order (first listed wins), so equality must not count as a win.
    pub(crate) fn beats(&self, other: &MatchScore) -> bool {
        self.rank() > other.rank()
    }

    fn rank(&self) -> (i8, bool, ParameterMatch, u16) {
        (self.depth, self.is_exact(), self.matched, self.quality)
    }
}

fn type_name_depth(source: &MediaType, target: &MediaType) -> i8 {
    if source.type_name() == "*" {
        return 0;
    }
    if !source.type_name().eq_ignore_ascii_case(target.type_name()) {
        return -1;
    }
    if source.subtype() == "*" {
        return 1;
    }
    if source.subtype().eq_ignore_ascii_case(target.subtype()) {
        return 2;
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_type::parse_exactly_one;

    fn score(source: &str, target: &str) -> MatchScore {
        let source = parse_exactly_one(source).unwrap();
        let target = parse_exactly_one(target).unwrap();
        MatchScore::evaluate(&source, &target).unwrap()
    }

    #[test]
    fn exact_type_and_subtype_is_depth_two_and_exact() {
        let s = score("application/json", "application/json");
        assert!(s.is_match());
        assert!(s.is_exact());
    }

    #[test]
    fn full_wildcard_matches_everything_at_depth_zero() {
        let s = score("*/*", "application/atom+xml;type=feed");
        assert!(s.is_match());
        assert!(!s.is_exact());
    }

    #[test]
    fn subtype_wildcard_requires_matching_type() {
        assert!(score("application/*", "application/xml").is_match());
        assert!(!score("text/*", "application/xml").is_match());
    }

    #[test]
    fn differing_names_do_not_match() {
        assert!(!score("application/json", "application/xml").is_match());
        assert!(!score("text/json", "application/json").is_match());
    }

    #[test]
    fn type_names_compare_case_insensitively() {
        let s = score("Application/JSON", "application/json");
        assert!(s.is_match());
        assert!(s.is_exact());
    }

    #[test]
    fn unmatched_source_parameter_rejects_a_named_match() {
        let s = score("application/atom+xml;type=feed", "application/atom+xml");
        assert!(!s.is_match());
    }

    #[test]
    fn matched_source_parameter_is_exact() {
        let s = score("application/atom+xml;type=feed", "application/atom+xml;type=feed");
        assert!(s.is_match());
        assert!(s.is_exact());
    }

    #[test]
    fn parameterless_source_against_parameterized_target_matches_inexactly() {
        let s = score("application/atom+xml", "application/atom+xml;type=feed");
        assert!(s.is_match());
        assert!(!s.is_exact());
    }

    #[test]
    fn quality_zero_never_matches() {
        let s = score("application/json;q=0", "application/json");
        assert!(!s.is_match());
    }

    #[test]
    fn parameters_after_quality_are_accept_extensions() {
        // `level` comes after `q`, so it must not participate in matching.
        let s = score("application/json;q=0.8;level=1", "application/json");
        assert!(s.is_match());
        assert_eq!(s.quality(), 800);
    }

    #[test]
    fn deeper_match_beats_higher_quality() {
        let wildcard = score("*/*", "application/json");
        let named = score("application/json;q=0.1", "application/json");
        assert!(named.beats(&wildcard));
        assert!(!wildcard.beats(&named));
    }

    #[test]
    fn higher_quality_breaks_depth_ties() {
        let low = score("application/json;q=0.5", "application/json");
        let high = score("application/xml;q=0.9", "application/xml");
        assert!(high.beats(&low));
    }

    #[test]
    fn equal_scores_do_not_beat_each_other() {
        let a = score("application/json", "application/json");
        let b = score("application/json", "application/json");
        assert!(!a.beats(&b));
        assert!(!b.beats(&a));
    }
}
