//! Validity scoring.
//!
//! Contrasts how often high- and low-scoring test-takers answer each question
//! correctly. A score near zero or below marks a question that does not
//! separate stronger from weaker candidates and deserves manual review.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grading;
use crate::model::{Attempt, AttemptId, Exam, Question, QuestionId};

/// Fewer completed attempts than this and nothing is computed.
pub const MIN_COMPLETED_ATTEMPTS: usize = 10;

/// Default fraction of attempts forming the low-scoring group.
pub const DEFAULT_THRESHOLD: f64 = 0.25;

/// Correctness of every answered question in one completed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcomes {
    pub attempt_id: AttemptId,
    pub score_percent: u32,
    /// Only questions the attempt recorded an answer for.
    pub correct: BTreeMap<QuestionId, bool>,
}

/// Grade the recorded answers of a completed attempt.
///
/// Returns `None` for attempts that are not completed or carry no score.
/// Answers whose exam question or question cannot be resolved are ignored.
pub fn attempt_outcomes(
    attempt: &Attempt,
    exam: &Exam,
    questions: &BTreeMap<QuestionId, Question>,
) -> Option<AttemptOutcomes> {
    if !attempt.is_completed() {
        return None;
    }
    let score_percent = attempt.score_percent?;

    let correct = attempt
        .answers
        .iter()
        .filter_map(|(eq_id, answer)| {
            let eq = exam.exam_question(*eq_id)?;
            let question = questions.get(&eq.question_id)?;
            Some((question.id, grading::is_correct(question, answer)))
        })
        .collect();

    Some(AttemptOutcomes {
        attempt_id: attempt.id,
        score_percent,
        correct,
    })
}

/// What a validity pass produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidityRun {
    /// Nothing may be written.
    Skipped { reason: String },
    /// `rate(high) - rate(low)` for every question answered in both groups.
    Computed {
        low_group: usize,
        high_group: usize,
        scores: BTreeMap<QuestionId, f64>,
    },
}

/// Split attempts at `threshold` and score each question.
///
/// Attempts are ordered by score, then id. The first `floor(n * threshold)`
/// form the low group and the rest the high group. Questions with no answers
/// in one of the groups get no score.
pub fn compute_validity_scores(mut attempts: Vec<AttemptOutcomes>, threshold: f64) -> ValidityRun {
    let n = attempts.len();
    if n < MIN_COMPLETED_ATTEMPTS {
        return ValidityRun::Skipped {
            reason: format!(
                "{n} completed attempt(s), at least {MIN_COMPLETED_ATTEMPTS} required"
            ),
        };
    }

    attempts.sort_by_key(|a| (a.score_percent, a.attempt_id));
    let split = (n as f64 * threshold).floor() as usize;
    let (low, high) = attempts.split_at(split.min(n));
    if low.is_empty() || high.is_empty() {
        return ValidityRun::Skipped {
            reason: format!(
                "threshold {threshold} leaves an empty group ({} low, {} high)",
                low.len(),
                high.len()
            ),
        };
    }

    let low_rates = correct_rates(low);
    let high_rates = correct_rates(high);
    let scores = high_rates
        .iter()
        .filter_map(|(qid, high_rate)| low_rates.get(qid).map(|low_rate| (*qid, high_rate - low_rate)))
        .collect();

    ValidityRun::Computed {
        low_group: low.len(),
        high_group: high.len(),
        scores,
    }
}

fn correct_rates(group: &[AttemptOutcomes]) -> BTreeMap<QuestionId, f64> {
    let mut tally: BTreeMap<QuestionId, (usize, usize)> = BTreeMap::new();
    for attempt in group {
        for (&qid, &correct) in &attempt.correct {
            let entry = tally.entry(qid).or_insert((0, 0));
            entry.1 += 1;
            if correct {
                entry.0 += 1;
            }
        }
    }
    tally
        .into_iter()
        .map(|(qid, (correct, total))| (qid, correct as f64 / total as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcomes(id: AttemptId, score: u32, correct: &[(QuestionId, bool)]) -> AttemptOutcomes {
        AttemptOutcomes {
            attempt_id: id,
            score_percent: score,
            correct: correct.iter().copied().collect(),
        }
    }

    #[test]
    fn fewer_than_ten_attempts_is_skipped() {
        let attempts = (0..9).map(|i| outcomes(i, 50, &[(1, true)])).collect();
        assert!(matches!(
            compute_validity_scores(attempts, DEFAULT_THRESHOLD),
            ValidityRun::Skipped { .. }
        ));
    }

    #[test]
    fn empty_group_is_skipped() {
        let attempts = (0..10).map(|i| outcomes(i, 50, &[(1, true)])).collect();
        // floor(10 * 0.05) == 0
        assert!(matches!(
            compute_validity_scores(attempts, 0.05),
            ValidityRun::Skipped { .. }
        ));
    }

    #[test]
    fn discriminating_question_scores_positive() {
        // 12 attempts: bottom 3 miss question 1, top 9 get it.
        // Question 2 is answered correctly by the weak group only.
        let mut attempts = Vec::new();
        for i in 0..3 {
            attempts.push(outcomes(i, 20 + i as u32, &[(1, false), (2, true)]));
        }
        for i in 3..12 {
            attempts.push(outcomes(i, 60 + i as u32, &[(1, true), (2, false)]));
        }

        let ValidityRun::Computed {
            low_group,
            high_group,
            scores,
        } = compute_validity_scores(attempts, 0.25)
        else {
            panic!("expected a computed run");
        };
        assert_eq!(low_group, 3);
        assert_eq!(high_group, 9);
        assert!((scores[&1] - 1.0).abs() < 1e-9);
        assert!((scores[&2] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn question_missing_from_a_group_is_unscored() {
        let mut attempts: Vec<_> = (0..10).map(|i| outcomes(i, i as u32 * 10, &[(1, true)])).collect();
        attempts[9].correct.insert(7, true);
        let ValidityRun::Computed { scores, .. } = compute_validity_scores(attempts, 0.25) else {
            panic!("expected a computed run");
        };
        assert!(scores.contains_key(&1));
        assert!(!scores.contains_key(&7));
    }

    #[test]
    fn ordering_ignores_input_order() {
        let build = || -> Vec<AttemptOutcomes> {
            (0..10)
                .map(|i| outcomes(i, (i as u32 * 37) % 100, &[(1, i % 2 == 0)]))
                .collect()
        };
        let forward = compute_validity_scores(build(), 0.3);
        let mut reversed = build();
        reversed.reverse();
        assert_eq!(forward, compute_validity_scores(reversed, 0.3));
    }
}
