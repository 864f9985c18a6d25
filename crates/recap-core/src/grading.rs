//! Grading engine.
//!
//! Decides correctness per question type and aggregates exam and domain
//! scores. Everything here is synchronous and works on one attempt.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hints;
use crate::model::{Answer, ChoiceId, ExamQuestionId, Question, QuestionId, QuestionType};

/// Result of one question in a graded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
    /// No answer, or an answer with nothing selected and no text.
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Correct => write!(f, "correct"),
            Outcome::Incorrect => write!(f, "incorrect"),
            Outcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Whether `answer` satisfies the question's correctness rule.
pub fn is_correct(question: &Question, answer: &Answer) -> bool {
    match question.question_type {
        QuestionType::Single | QuestionType::TrueFalse => {
            let correct = question.correct_choice_ids();
            answer.choice_ids.len() == 1 && correct.len() == 1 && answer.choice_ids[0] == correct[0]
        }
        QuestionType::Multi => {
            let selected: BTreeSet<ChoiceId> = answer.choice_ids.iter().copied().collect();
            let correct: BTreeSet<ChoiceId> = question.correct_choice_ids().into_iter().collect();
            !correct.is_empty() && selected == correct
        }
        QuestionType::FillBlank => {
            let Some(text) = answer.text.as_deref() else {
                return false;
            };
            let normalized = text.trim().to_lowercase();
            question.acceptable_answers.iter().any(|a| *a == normalized)
        }
    }
}

pub fn evaluate(question: &Question, answer: Option<&Answer>) -> Outcome {
    match answer {
        None => Outcome::Skipped,
        Some(a) if a.is_blank() => Outcome::Skipped,
        Some(a) if is_correct(question, a) => Outcome::Correct,
        Some(_) => Outcome::Incorrect,
    }
}

/// `round(correct / total * 100)`; an empty exam scores 0.
pub fn score_percent(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

/// Pass iff the rounded score reaches the passing score.
pub fn passes(score_percent: u32, passing_score: f64) -> bool {
    f64::from(score_percent) >= passing_score
}

/// One question as it appears in a submission.
#[derive(Debug, Clone, Copy)]
pub struct GradedItem<'a> {
    pub exam_question_id: ExamQuestionId,
    pub question: &'a Question,
    pub answer: Option<&'a Answer>,
}

/// Per-question line of the detailed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionReport {
    pub exam_question_id: ExamQuestionId,
    pub question_id: QuestionId,
    pub domain: String,
    pub question: String,
    pub your_answer: Vec<String>,
    pub correct_answer: Vec<String>,
    pub result: Outcome,
    pub explanation: String,
}

/// Final result of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSubmissionResult {
    pub score_percent: u32,
    pub pass: bool,
    pub passing_score: f64,
    pub correct_count: usize,
    pub total_questions: usize,
    /// Score per domain present in the exam, including domains scoring 0.
    pub domain_breakdown: BTreeMap<String, u32>,
    pub detailed_report: Vec<QuestionReport>,
}

/// Grade every question of an attempt, in exam order.
pub fn grade_submission<'a>(
    items: impl IntoIterator<Item = GradedItem<'a>>,
    passing_score: f64,
) -> ExamSubmissionResult {
    let mut correct_count = 0;
    let mut total_questions = 0;
    let mut per_domain: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut detailed_report = Vec::new();

    for item in items {
        let question = item.question;
        let result = evaluate(question, item.answer);

        total_questions += 1;
        let entry = per_domain.entry(question.domain.clone()).or_insert((0, 0));
        entry.1 += 1;
        if result == Outcome::Correct {
            correct_count += 1;
            entry.0 += 1;
        }

        detailed_report.push(QuestionReport {
            exam_question_id: item.exam_question_id,
            question_id: question.id,
            domain: question.domain.clone(),
            question: question.text.clone(),
            your_answer: item
                .answer
                .map(|a| answer_texts(question, a))
                .unwrap_or_default(),
            correct_answer: correct_texts(question),
            result,
            explanation: question.explanation.clone(),
        });
    }

    let score = score_percent(correct_count, total_questions);
    ExamSubmissionResult {
        score_percent: score,
        pass: total_questions > 0 && passes(score, passing_score),
        passing_score,
        correct_count,
        total_questions,
        domain_breakdown: per_domain
            .into_iter()
            .map(|(domain, (correct, total))| (domain, score_percent(correct, total)))
            .collect(),
        detailed_report,
    }
}

fn answer_texts(question: &Question, answer: &Answer) -> Vec<String> {
    if question.question_type.is_choice_based() {
        answer
            .choice_ids
            .iter()
            .map(|&id| match question.choice(id) {
                Some(choice) => choice.text.clone(),
                None => format!("unknown choice {id}"),
            })
            .collect()
    } else {
        answer
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| vec![t.to_string()])
            .unwrap_or_default()
    }
}

fn correct_texts(question: &Question) -> Vec<String> {
    if question.question_type.is_choice_based() {
        question
            .choices
            .iter()
            .filter(|c| c.is_correct)
            .map(|c| c.text.clone())
            .collect()
    } else {
        question.acceptable_answers.clone()
    }
}

/// Per-choice annotation returned in practice mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceFeedback {
    pub choice_id: ChoiceId,
    pub label: char,
    pub is_correct: bool,
    pub selected: bool,
    pub explanation: String,
}

/// Immediate feedback for one practice-mode answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choice_feedback: Vec<ChoiceFeedback>,
}

pub fn practice_feedback(question: &Question, answer: &Answer) -> AnswerFeedback {
    let correct = is_correct(question, answer);

    let choice_feedback = question
        .choices
        .iter()
        .map(|c| ChoiceFeedback {
            choice_id: c.id,
            label: c.label,
            is_correct: c.is_correct,
            selected: answer.choice_ids.contains(&c.id),
            explanation: c.explanation.clone(),
        })
        .collect();

    let hint = match (&question.question_type, correct, answer.text.as_deref()) {
        (QuestionType::FillBlank, false, Some(text)) => hints::suggest_hint(question, text),
        _ => None,
    };

    AnswerFeedback {
        correct,
        explanation: question.explanation.clone(),
        hint,
        choice_feedback,
    }
}
