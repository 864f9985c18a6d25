//! Exam sizing.
//!
//! Picks the questions-per-exam value in `[min, max]` that splits the pool
//! into whole exams with the fewest unused questions, while giving every
//! weighted domain its share of each exam. Under [`ReuseScope::PerBatch`] the
//! exam count is also capped by the scarcest domain, since no question may be
//! drawn twice in one batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::model::Question;
use crate::selector::ReuseScope;
use crate::weights::DomainWeights;

/// The sizing decision for one course and bank version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamPlan {
    /// Sum of the per-domain quotas. May differ from `target_size` by rounding.
    pub questions_per_exam: usize,
    pub num_exams: usize,
    pub per_domain_quota: BTreeMap<String, usize>,
    /// The candidate size in `[min, max]` that produced this plan.
    pub target_size: usize,
    /// Questions left over after `num_exams` full exams.
    pub unused_questions: usize,
}

/// How one candidate size fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub target_size: usize,
    pub outcome: CandidateOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Feasible {
        questions_per_exam: usize,
        num_exams: usize,
        remainder: usize,
        per_domain_quota: BTreeMap<String, usize>,
    },
    /// A domain has fewer questions than one exam needs from it.
    ShortDomain {
        domain: String,
        available: usize,
        required: usize,
    },
    /// Every quota rounded to zero.
    Empty,
}

/// Count questions per domain.
pub fn domain_counts(questions: &[Question]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for q in questions {
        *counts.entry(q.domain.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Per-domain quota for an exam of `size` questions.
///
/// `round(size * weight)`, but never zero for a domain with positive weight.
pub fn quotas_for(size: usize, weights: &DomainWeights) -> BTreeMap<String, usize> {
    weights
        .iter()
        .map(|(domain, weight)| {
            let mut required = (size as f64 * weight).round() as usize;
            if required == 0 && weight > 0.0 {
                required = 1;
            }
            (domain.to_string(), required)
        })
        .collect()
}

/// Evaluate every candidate size in `[min, max]`.
pub fn evaluate_candidates(
    counts: &BTreeMap<&str, usize>,
    total: usize,
    min: usize,
    max: usize,
    weights: &DomainWeights,
    scope: ReuseScope,
) -> Vec<Candidate> {
    (min..=max)
        .map(|target_size| Candidate {
            target_size,
            outcome: evaluate(counts, total, target_size, weights, scope),
        })
        .collect()
}

fn evaluate(
    counts: &BTreeMap<&str, usize>,
    total: usize,
    target_size: usize,
    weights: &DomainWeights,
    scope: ReuseScope,
) -> CandidateOutcome {
    let quota = quotas_for(target_size, weights);

    for (domain, &required) in &quota {
        let available = counts.get(domain.as_str()).copied().unwrap_or(0);
        if available < required {
            return CandidateOutcome::ShortDomain {
                domain: domain.clone(),
                available,
                required,
            };
        }
    }

    let questions_per_exam: usize = quota.values().sum();
    if questions_per_exam == 0 {
        return CandidateOutcome::Empty;
    }

    let mut num_exams = total / questions_per_exam;
    if scope == ReuseScope::PerBatch {
        for (domain, &required) in &quota {
            if required > 0 {
                let available = counts.get(domain.as_str()).copied().unwrap_or(0);
                num_exams = num_exams.min(available / required);
            }
        }
    }

    CandidateOutcome::Feasible {
        questions_per_exam,
        num_exams,
        remainder: total - num_exams * questions_per_exam,
        per_domain_quota: quota,
    }
}

/// Choose the plan for a question pool.
///
/// Lowest remainder wins; ties go to the candidate with more exams, then to
/// the smaller size.
pub fn plan_exams(
    questions: &[Question],
    min: usize,
    max: usize,
    weights: &DomainWeights,
    scope: ReuseScope,
) -> Result<ExamPlan, PlanError> {
    let counts = domain_counts(questions);
    plan_from_counts(&counts, questions.len(), min, max, weights, scope)
}

/// [`plan_exams`] over precomputed domain counts.
pub fn plan_from_counts(
    counts: &BTreeMap<&str, usize>,
    total: usize,
    min: usize,
    max: usize,
    weights: &DomainWeights,
    scope: ReuseScope,
) -> Result<ExamPlan, PlanError> {
    if min == 0 || min > max {
        return Err(PlanError::InvalidBounds { min, max });
    }

    let mut best: Option<ExamPlan> = None;
    for candidate in evaluate_candidates(counts, total, min, max, weights, scope) {
        let CandidateOutcome::Feasible {
            questions_per_exam,
            num_exams,
            remainder,
            per_domain_quota,
        } = candidate.outcome
        else {
            continue;
        };
        if num_exams == 0 {
            continue;
        }

        let better = match &best {
            None => true,
            Some(b) => {
                remainder < b.unused_questions
                    || (remainder == b.unused_questions && num_exams > b.num_exams)
            }
        };
        if better {
            best = Some(ExamPlan {
                questions_per_exam,
                num_exams,
                per_domain_quota,
                target_size: candidate.target_size,
                unused_questions: remainder,
            });
        }
    }

    best.ok_or(PlanError::InsufficientQuestions { min, max, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts<'a>(pairs: &[(&'a str, usize)]) -> BTreeMap<&'a str, usize> {
        pairs.iter().copied().collect()
    }

    fn weights(pairs: &[(&str, f64)]) -> DomainWeights {
        pairs.iter().map(|&(n, w)| (n, w)).collect()
    }

    #[test]
    fn ten_questions_two_even_domains() {
        let w = weights(&[("A", 0.5), ("B", 0.5)]);
        let c = counts(&[("A", 5), ("B", 5)]);
        let plan = plan_from_counts(&c, 10, 4, 6, &w, ReuseScope::PerExam).unwrap();

        assert!((4..=6).contains(&plan.target_size));
        assert_eq!(
            plan.per_domain_quota.values().sum::<usize>(),
            plan.questions_per_exam
        );
        // size 4 -> 2+2, 2 exams, remainder 2; 5 and 6 -> 3+3, remainder 4
        assert_eq!(plan.questions_per_exam, 4);
        assert_eq!(plan.num_exams, 2);
        assert_eq!(plan.unused_questions, 2);
        assert_eq!(plan.per_domain_quota["A"], 2);
        assert_eq!(plan.per_domain_quota["B"], 2);
    }

    #[test]
    fn lowest_remainder_wins() {
        let w = weights(&[("A", 1.0)]);
        // 12 questions: size 5 -> r2, size 6 -> r0, size 7 -> r5
        let c = counts(&[("A", 12)]);
        let plan = plan_from_counts(&c, 12, 5, 7, &w, ReuseScope::PerExam).unwrap();
        assert_eq!(plan.questions_per_exam, 6);
        assert_eq!(plan.num_exams, 2);
        assert_eq!(plan.unused_questions, 0);
    }

    #[test]
    fn tie_prefers_more_exams() {
        let w = weights(&[("A", 1.0)]);
        // 12 questions: size 3 -> 4 exams r0, size 4 -> 3 exams r0
        let c = counts(&[("A", 12)]);
        let plan = plan_from_counts(&c, 12, 3, 4, &w, ReuseScope::PerExam).unwrap();
        assert_eq!(plan.questions_per_exam, 3);
        assert_eq!(plan.num_exams, 4);
    }

    #[test]
    fn small_weight_forced_to_one() {
        let w = weights(&[("Big", 0.95), ("Tiny", 0.05)]);
        let quota = quotas_for(4, &w);
        assert_eq!(quota["Big"], 4);
        assert_eq!(quota["Tiny"], 1);
    }

    #[test]
    fn zero_weight_domain_gets_zero_quota() {
        let w = weights(&[("A", 1.0), ("Retired", 0.0)]);
        let quota = quotas_for(10, &w);
        assert_eq!(quota["Retired"], 0);
    }

    #[test]
    fn rounding_can_exceed_target() {
        let w = weights(&[("A", 0.5), ("B", 0.5)]);
        let quota = quotas_for(5, &w);
        assert_eq!(quota.values().sum::<usize>(), 6);
    }

    #[test]
    fn short_domain_makes_candidate_infeasible() {
        let w = weights(&[("A", 0.5), ("B", 0.5)]);
        let c = counts(&[("A", 20), ("B", 2)]);
        let candidates = evaluate_candidates(&c, 22, 4, 6, &w, ReuseScope::PerExam);
        assert!(matches!(candidates[0].outcome, CandidateOutcome::Feasible { .. }));
        assert!(matches!(
            candidates[2].outcome,
            CandidateOutcome::ShortDomain { ref domain, available: 2, required: 3 } if domain == "B"
        ));
        let plan = plan_from_counts(&c, 22, 4, 6, &w, ReuseScope::PerExam).unwrap();
        assert_eq!(plan.per_domain_quota["B"], 2);
    }

    #[test]
    fn insufficient_questions_is_an_error() {
        let w = weights(&[("A", 0.5), ("B", 0.5)]);
        let c = counts(&[("A", 1), ("B", 1)]);
        let err = plan_from_counts(&c, 2, 4, 6, &w, ReuseScope::PerExam).unwrap_err();
        assert_eq!(
            err,
            PlanError::InsufficientQuestions {
                min: 4,
                max: 6,
                total: 2
            }
        );
    }

    #[test]
    fn missing_domain_is_infeasible() {
        let w = weights(&[("A", 0.5), ("B", 0.5)]);
        let c = counts(&[("A", 30)]);
        assert!(plan_from_counts(&c, 30, 2, 4, &w, ReuseScope::PerExam).is_err());
    }

    #[test]
    fn invalid_bounds_rejected() {
        let w = weights(&[("A", 1.0)]);
        let c = counts(&[("A", 10)]);
        assert!(matches!(
            plan_from_counts(&c, 10, 6, 4, &w, ReuseScope::PerExam),
            Err(PlanError::InvalidBounds { min: 6, max: 4 })
        ));
        assert!(matches!(
            plan_from_counts(&c, 10, 0, 4, &w, ReuseScope::PerExam),
            Err(PlanError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn quotas_never_exceed_availability() {
        let w = weights(&[("A", 0.6), ("B", 0.3), ("C", 0.1)]);
        let c = counts(&[("A", 40), ("B", 11), ("C", 3)]);
        let plan = plan_from_counts(&c, 54, 10, 30, &w, ReuseScope::PerExam).unwrap();
        for (domain, quota) in &plan.per_domain_quota {
            assert!(c[domain.as_str()] >= *quota);
        }
        assert_eq!(plan.num_exams, 54 / plan.questions_per_exam);
    }

    #[test]
    fn per_batch_caps_exams_by_scarcest_domain() {
        let w = weights(&[("A", 0.75), ("B", 0.25)]);
        let c = counts(&[("A", 6), ("B", 6)]);

        let shared = plan_from_counts(&c, 12, 4, 4, &w, ReuseScope::PerExam).unwrap();
        assert_eq!(shared.num_exams, 3);

        // 3 A per exam out of 6 A: only two disjoint exams fit.
        let disjoint = plan_from_counts(&c, 12, 4, 4, &w, ReuseScope::PerBatch).unwrap();
        assert_eq!(disjoint.num_exams, 2);
        assert_eq!(disjoint.unused_questions, 4);
        assert_eq!(disjoint.per_domain_quota["A"], 3);
    }

    #[test]
    fn per_batch_prefers_the_size_that_wastes_less() {
        let w = weights(&[("A", 0.5), ("B", 0.5)]);
        // Size 4 (2+2): min(12/4, 10/2, 2/2) = 1 exam, 8 unused.
        // Size 2 (1+1): min(12/2, 10/1, 2/1) = 2 exams, 8 unused, more exams.
        let c = counts(&[("A", 10), ("B", 2)]);
        let plan = plan_from_counts(&c, 12, 2, 4, &w, ReuseScope::PerBatch).unwrap();
        assert_eq!(plan.questions_per_exam, 2);
        assert_eq!(plan.num_exams, 2);
        assert_eq!(plan.unused_questions, 8);
    }
}
