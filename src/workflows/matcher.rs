use std::cmp::Ordering;

use crate::domain::models::{MatchResult, ReferenceEntry};

const WEIGHT_FACTOR: f64 = 25.0;

/// Scores `lines` against one reference entry.
///
/// `count` is the number of candidate lines found verbatim in the entry's
/// text. Confidence is `count` over the entry's line count, and the weighted
/// score grows with the log of the entry length so that equal counts favour
/// longer references.
pub fn score(entry: &ReferenceEntry, lines: &[String]) -> MatchResult {
    let matched = lines
        .iter()
        .filter(|line| entry.contents.contains(line.as_str()))
        .count();
    let count = matched as f64;

    let confidence = if entry.line_count == 0 {
        0.0
    } else {
        (count / entry.line_count as f64).min(1.0)
    };
    let weighted_confidence =
        count * (entry.line_count as f64 + WEIGHT_FACTOR).ln() / WEIGHT_FACTOR.ln();

    MatchResult {
        episode: entry.episode.clone(),
        matched,
        line_count: entry.line_count,
        confidence,
        weighted_confidence,
    }
}

/// Best-scoring entry by weighted score, then confidence. `None` only for an
/// empty corpus.
pub fn best_match(corpus: &[ReferenceEntry], lines: &[String]) -> Option<MatchResult> {
    corpus
        .iter()
        .map(|entry| score(entry, lines))
        .max_by(compare_results)
}

fn compare_results(a: &MatchResult, b: &MatchResult) -> Ordering {
    a.weighted_confidence
        .total_cmp(&b.weighted_confidence)
        .then(a.confidence.total_cmp(&b.confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EpisodeId;

    fn entry(episode: u32, lines: &[&str]) -> ReferenceEntry {
        let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        ReferenceEntry::from_lines(EpisodeId::single(1, episode), &lines)
    }

    fn lines(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_full_match() {
        let reference = entry(3, &["never tell me the odds", "laugh it up fuzzball"]);
        let result = score(&reference, &lines(&["never tell me the odds", "laugh it up fuzzball"]));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.confidence_percent(), 100);
        let expected_weight = 2.0 * 27f64.ln() / 25f64.ln();
        assert!((result.weighted_confidence - expected_weight).abs() < 1e-9);
    }

    #[test]
    fn test_substring_lines_count() {
        let reference = entry(1, &["i have a bad feeling about this"]);
        let result = score(&reference, &lines(&["bad feeling", "something else"]));
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let reference = entry(1, &["hello there general kenobi"]);
        let result = score(&reference, &lines(&["hello", "there", "kenobi"]));
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_empty_entry_scores_zero() {
        let reference = entry(1, &[]);
        let result = score(&reference, &lines(&["anything"]));
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.weighted_confidence, 0.0);
    }

    #[test]
    fn test_adding_a_matching_line_never_lowers_confidence() {
        let reference = entry(1, &["one", "two", "three", "four"]);
        let mut candidate = lines(&["zero"]);
        let mut previous = score(&reference, &candidate).confidence;
        for line in ["one", "two", "three", "four"] {
            candidate.push(line.to_string());
            let current = score(&reference, &candidate).confidence;
            assert!(current >= previous);
            previous = current;
        }
        assert_eq!(previous, 1.0);
    }

    #[test]
    fn test_equal_counts_prefer_longer_reference() {
        let short = entry(1, &["we meet again", "at last"]);
        let long = entry(
            2,
            &["we meet again", "at last", "the circle is now complete", "when i left you", "i was but the learner"],
        );
        let candidate = lines(&["we meet again", "at last"]);

        let best = best_match(&[short, long], &candidate).unwrap();

        assert_eq!(best.episode, EpisodeId::single(1, 2));
        assert!(best.confidence < 1.0);
    }

    #[test]
    fn test_equal_confidence_prefers_more_matched_lines() {
        let half_of_two = entry(1, &["i am your father", "no"]);
        let half_of_four = entry(
            2,
            &["search your feelings", "you know it to be true", "join me", "rule the galaxy"],
        );
        let candidate = lines(&["i am your father", "search your feelings", "join me"]);

        let a = score(&half_of_two, &candidate);
        let b = score(&half_of_four, &candidate);
        assert_eq!(a.confidence, b.confidence);

        let best = best_match(&[half_of_two, half_of_four], &candidate).unwrap();
        assert_eq!(best.episode, EpisodeId::single(1, 2));
        assert_eq!(best.matched, 2);
    }

    #[test]
    fn test_duplicate_lines_never_lower_confidence() {
        let reference = entry(1, &["it's a trap", "all wings report in", "stay on target"]);
        let mut candidate = lines(&["it's a trap", "nothing here"]);
        let mut previous = score(&reference, &candidate).confidence;
        for _ in 0..4 {
            candidate.push("it's a trap".to_string());
            let current = score(&reference, &candidate).confidence;
            assert!(current >= previous);
            previous = current;
        }
        assert_eq!(previous, 1.0);
    }

    #[test]
    fn test_best_match_picks_highest_count() {
        let corpus = vec![
            entry(1, &["these aren't the droids you're looking for"]),
            entry(2, &["that's no moon", "it's a space station"]),
        ];
        let best = best_match(&corpus, &lines(&["that's no moon", "space station"])).unwrap();
        assert_eq!(best.episode, EpisodeId::single(1, 2));
    }

    #[test]
    fn test_empty_corpus() {
        assert!(best_match(&[], &lines(&["anything"])).is_none());
    }
}
