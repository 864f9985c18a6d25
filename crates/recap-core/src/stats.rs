//! Per-question statistics and per-taker history.
//!
//! Question stats count every non-blank answer given to a question through
//! any current exam of its course, open attempts included. History lists a
//! taker's completed attempts, regraded for the domain breakdown when the
//! exam still exists.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grading::{self, GradedItem};
use crate::model::{
    Attempt, AttemptId, AttemptMode, Exam, ExamId, ExamQuestionId, Question, QuestionId,
    QuestionType,
};
use crate::traits::ExamStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question_id: QuestionId,
    pub domain: String,
    pub question_type: QuestionType,
    pub text: String,
    pub validity_score: Option<f64>,
    pub flagged: bool,
    pub times_attempted: usize,
    pub correct_count: usize,
}

impl QuestionStats {
    /// `None` until someone has answered the question.
    pub fn correct_rate(&self) -> Option<f64> {
        (self.times_attempted > 0).then(|| self.correct_count as f64 / self.times_attempted as f64)
    }
}

/// Tally answers per question, in question id order.
pub fn question_stats(
    questions: &[Question],
    exams: &[Exam],
    attempts: &[Attempt],
) -> Vec<QuestionStats> {
    let by_id: BTreeMap<QuestionId, &Question> = questions.iter().map(|q| (q.id, q)).collect();
    let positions: BTreeMap<ExamQuestionId, QuestionId> = exams
        .iter()
        .flat_map(|e| e.questions.iter().map(|eq| (eq.id, eq.question_id)))
        .collect();

    let mut tally: BTreeMap<QuestionId, (usize, usize)> = BTreeMap::new();
    for attempt in attempts {
        for (eq_id, answer) in &attempt.answers {
            if answer.is_blank() {
                continue;
            }
            let Some(question) = positions.get(eq_id).and_then(|qid| by_id.get(qid)) else {
                continue;
            };
            let entry = tally.entry(question.id).or_insert((0, 0));
            entry.0 += 1;
            if grading::is_correct(question, answer) {
                entry.1 += 1;
            }
        }
    }

    by_id
        .values()
        .map(|q| {
            let (times_attempted, correct_count) = tally.get(&q.id).copied().unwrap_or((0, 0));
            QuestionStats {
                question_id: q.id,
                domain: q.domain.clone(),
                question_type: q.question_type,
                text: q.text.clone(),
                validity_score: q.validity_score,
                flagged: q.flagged,
                times_attempted,
                correct_count,
            }
        })
        .collect()
}

/// Stats for every question of a course's current bank.
pub async fn course_question_stats(
    store: &dyn ExamStore,
    course_code: &str,
) -> Result<Vec<QuestionStats>> {
    store
        .course(course_code)
        .await?
        .with_context(|| format!("course '{course_code}' not found"))?;
    let questions = store.questions(course_code).await?;
    let exams = store.exams_for_course(course_code).await?;
    let attempts = store.attempts_for_course(course_code).await?;
    Ok(question_stats(&questions, &exams, &attempts))
}

/// One completed attempt in a taker's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub attempt_id: AttemptId,
    pub exam_id: ExamId,
    /// `None` once the exam was replaced by a later generation.
    pub exam_title: Option<String>,
    pub course_code: Option<String>,
    pub mode: AttemptMode,
    pub score_percent: u32,
    pub pass: Option<bool>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub domain_breakdown: BTreeMap<String, u32>,
}

/// A taker's completed attempts, most recent first.
pub async fn taker_history(store: &dyn ExamStore, taker: &str) -> Result<Vec<HistoryEntry>> {
    let attempts = store.attempts_for_taker(taker).await?;
    let mut exams: BTreeMap<ExamId, Option<(Exam, Vec<Question>)>> = BTreeMap::new();
    let mut history = Vec::with_capacity(attempts.len());

    for attempt in attempts {
        let Some(completed_at) = attempt.completed_at else {
            continue;
        };
        if !exams.contains_key(&attempt.exam_id) {
            let loaded = load_exam(store, attempt.exam_id).await?;
            exams.insert(attempt.exam_id, loaded);
        }

        let mut entry = HistoryEntry {
            attempt_id: attempt.id,
            exam_id: attempt.exam_id,
            exam_title: None,
            course_code: None,
            mode: attempt.mode,
            score_percent: attempt.score_percent.unwrap_or(0),
            pass: None,
            completed_at,
            domain_breakdown: BTreeMap::new(),
        };
        if let Some(Some((exam, questions))) = exams.get(&attempt.exam_id) {
            let items = exam
                .questions
                .iter()
                .zip(questions)
                .map(|(eq, question)| GradedItem {
                    exam_question_id: eq.id,
                    question,
                    answer: attempt.answers.get(&eq.id),
                });
            let graded = grading::grade_submission(items, exam.passing_score);
            entry.exam_title = Some(exam.title.clone());
            entry.course_code = Some(exam.course_code.clone());
            entry.pass = Some(grading::passes(entry.score_percent, exam.passing_score));
            entry.domain_breakdown = graded.domain_breakdown;
        }
        history.push(entry);
    }
    Ok(history)
}

/// The exam with its questions, or `None` if any part of it is gone.
async fn load_exam(
    store: &dyn ExamStore,
    exam_id: ExamId,
) -> Result<Option<(Exam, Vec<Question>)>> {
    let Some(exam) = store.exam(exam_id).await? else {
        return Ok(None);
    };
    let mut questions = Vec::with_capacity(exam.questions.len());
    for eq in &exam.questions {
        match store.question(eq.question_id).await? {
            Some(q) => questions.push(q),
            None => return Ok(None),
        }
    }
    Ok(Some((exam, questions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, Choice, ExamQuestion, InputMethod};
    use crate::weights::DomainWeights;

    fn single(id: QuestionId, domain: &str) -> Question {
        Question {
            id,
            domain: domain.into(),
            question_type: QuestionType::Single,
            text: format!("question {id}"),
            explanation: String::new(),
            image_url: None,
            code_block: None,
            input_method: InputMethod::Text,
            choices: vec![
                Choice {
                    id: 1,
                    label: 'A',
                    text: "right".into(),
                    is_correct: true,
                    explanation: String::new(),
                },
                Choice {
                    id: 2,
                    label: 'B',
                    text: "wrong".into(),
                    is_correct: false,
                    explanation: String::new(),
                },
            ],
            acceptable_answers: Vec::new(),
            bank_version: "1.0.0".into(),
            validity_score: None,
            flagged: false,
        }
    }

    fn exam(id: ExamId, positions: &[(ExamQuestionId, QuestionId)]) -> Exam {
        Exam {
            id,
            course_code: "lnx".into(),
            title: format!("Exam {id}"),
            index: id as usize - 1,
            seed: 0,
            bank_version: "1.0.0".into(),
            questions_per_exam: positions.len(),
            exam_time_minutes: 10,
            passing_score: 50.0,
            domain_weights: DomainWeights::parse("Shell:1").unwrap(),
            questions: positions
                .iter()
                .enumerate()
                .map(|(i, &(eq, qid))| ExamQuestion {
                    id: eq,
                    question_id: qid,
                    domain: "Shell".into(),
                    order: i as u32 + 1,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    fn attempt(id: AttemptId, exam_id: ExamId, answers: &[(ExamQuestionId, Answer)]) -> Attempt {
        Attempt {
            id,
            exam_id,
            taker: format!("t{id}@example.com"),
            mode: AttemptMode::Simulation,
            started_at: Utc::now(),
            completed_at: None,
            score_percent: None,
            answers: answers.iter().cloned().collect(),
            revision: answers.len() as u64,
        }
    }

    #[test]
    fn counts_answers_across_exams() {
        let mut flagged = single(2, "Shell");
        flagged.flagged = true;
        flagged.validity_score = Some(-0.2);
        let questions = vec![single(1, "Shell"), flagged, single(3, "Shell")];
        // Question 1 sits in both exams under different positions.
        let exams = vec![exam(1, &[(10, 1), (11, 2)]), exam(2, &[(20, 1), (21, 3)])];
        let attempts = vec![
            attempt(1, 1, &[(10, Answer::choices([1])), (11, Answer::choices([2]))]),
            attempt(2, 2, &[(20, Answer::choices([2])), (21, Answer::text(""))]),
            attempt(3, 1, &[(10, Answer::choices([1])), (99, Answer::choices([1]))]),
        ];

        let stats = question_stats(&questions, &exams, &attempts);
        let ids: Vec<QuestionId> = stats.iter().map(|s| s.question_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert_eq!((stats[0].times_attempted, stats[0].correct_count), (3, 2));
        assert_eq!((stats[1].times_attempted, stats[1].correct_count), (1, 0));
        assert!(stats[1].flagged);
        assert_eq!(stats[1].validity_score, Some(-0.2));
        // A blank answer is not an attempt.
        assert_eq!(stats[2].times_attempted, 0);
        assert_eq!(stats[2].correct_rate(), None);
        assert!((stats[0].correct_rate().unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn no_attempts_gives_zero_counts() {
        let questions = vec![single(1, "Shell")];
        let stats = question_stats(&questions, &[exam(1, &[(10, 1)])], &[]);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].times_attempted, 0);
        assert_eq!(stats[0].correct_count, 0);
    }
}
