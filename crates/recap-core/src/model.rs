//! Core data model types for recap.
//!
//! These are the records that flow between the bank parser, the planner,
//! the selector, the grading engine and the store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::weights::DomainWeights;

pub type QuestionId = u64;
pub type ChoiceId = u32;
pub type ExamId = u64;
pub type ExamQuestionId = u64;
pub type AttemptId = u64;

/// The four supported question types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multi,
    TrueFalse,
    FillBlank,
}

impl QuestionType {
    /// Whether the answer is a selection of choices rather than free text.
    pub fn is_choice_based(self) -> bool {
        !matches!(self, QuestionType::FillBlank)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::Single => write!(f, "single"),
            QuestionType::Multi => write!(f, "multi"),
            QuestionType::TrueFalse => write!(f, "truefalse"),
            QuestionType::FillBlank => write!(f, "fillblank"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(QuestionType::Single),
            "multi" => Ok(QuestionType::Multi),
            "truefalse" => Ok(QuestionType::TrueFalse),
            "fillblank" => Ok(QuestionType::FillBlank),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// How a fill-in-the-blank answer is typed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    #[default]
    Text,
    Terminal,
}

impl FromStr for InputMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "text" => Ok(InputMethod::Text),
            "terminal" => Ok(InputMethod::Terminal),
            other => Err(format!("unknown input method: {other}")),
        }
    }
}

/// One answer option of a choice-based question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Positional identifier, unique within its question.
    pub id: ChoiceId,
    /// Presentation label ('A', 'B', ...).
    pub label: char,
    pub text: String,
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: String,
}

/// A question bound to one bank version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// Owning domain name, matched case-sensitively against the bank weights.
    pub domain: String,
    pub question_type: QuestionType,
    pub text: String,
    pub explanation: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub code_block: Option<String>,
    #[serde(default)]
    pub input_method: InputMethod,
    /// Choices for `single`, `multi` and `truefalse` questions.
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Lower-cased acceptable answers for `fillblank` questions.
    #[serde(default)]
    pub acceptable_answers: Vec<String>,
    pub bank_version: String,
    /// Derived by the validity scorer; `None` until enough attempts exist.
    #[serde(default)]
    pub validity_score: Option<f64>,
    /// Set by an administrator after manual review.
    #[serde(default)]
    pub flagged: bool,
}

impl Question {
    /// Identifiers of every choice marked correct, in choice order.
    pub fn correct_choice_ids(&self) -> Vec<ChoiceId> {
        self.choices
            .iter()
            .filter(|c| c.is_correct)
            .map(|c| c.id)
            .collect()
    }

    pub fn choice(&self, id: ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }
}

/// Course-level metadata from `course.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    pub name: String,
    /// Public name; also part of the exam seed.
    pub marketing_name: String,
    #[serde(default)]
    pub duration_days: u32,
    #[serde(default)]
    pub responsibility: String,
}

/// Exam-bank metadata rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankMetadata {
    /// The bank version tag (`schema_version` row).
    pub bank_version: String,
    pub min_questions: usize,
    pub max_questions: usize,
    pub exam_time_minutes: u32,
    /// Percentage in `[0, 100]`.
    pub passing_score: f64,
    pub domains: DomainWeights,
}

/// A parsed and validated bank: one course, one version, all its questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    pub course: Course,
    pub metadata: BankMetadata,
    pub questions: Vec<Question>,
    /// SHA-256 over the source files, hex encoded.
    #[serde(default)]
    pub fingerprint: String,
}

impl QuestionBank {
    /// Bind store-allocated identifiers to the questions, in row order.
    pub fn assign_ids(&mut self, ids: &[QuestionId]) -> anyhow::Result<()> {
        anyhow::ensure!(
            ids.len() == self.questions.len(),
            "expected {} question ids, got {}",
            self.questions.len(),
            ids.len()
        );
        for (question, &id) in self.questions.iter_mut().zip(ids) {
            question.id = id;
        }
        Ok(())
    }

    /// Number rows 1..=n. Used for dry runs that never reach a store.
    pub fn with_sequential_ids(mut self) -> Self {
        for (i, question) in self.questions.iter_mut().enumerate() {
            question.id = i as QuestionId + 1;
        }
        self
    }
}

/// What the store remembers about the last committed bank of a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRecord {
    pub course: Course,
    pub metadata: BankMetadata,
    pub fingerprint: String,
    pub ingested_at: DateTime<Utc>,
}

/// A question position inside a generated exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftQuestion {
    pub question_id: QuestionId,
    pub domain: String,
    /// 1-indexed position.
    pub order: u32,
}

/// A generated exam before the store has assigned identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamDraft {
    pub index: usize,
    pub title: String,
    pub seed: u64,
    pub bank_version: String,
    pub questions_per_exam: usize,
    pub exam_time_minutes: u32,
    pub passing_score: f64,
    pub domain_weights: DomainWeights,
    pub questions: Vec<DraftQuestion>,
}

impl ExamDraft {
    /// Count of questions per domain.
    pub fn domain_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for q in &self.questions {
            *counts.entry(q.domain.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// A question bound into a persisted exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamQuestion {
    /// Identifier of this exam-bound instance; answers reference it.
    pub id: ExamQuestionId,
    pub question_id: QuestionId,
    pub domain: String,
    pub order: u32,
}

/// A generated, persisted exam. Only replaced wholesale by regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub course_code: String,
    pub title: String,
    pub index: usize,
    pub seed: u64,
    pub bank_version: String,
    pub questions_per_exam: usize,
    pub exam_time_minutes: u32,
    pub passing_score: f64,
    pub domain_weights: DomainWeights,
    /// Ordered by `order`.
    pub questions: Vec<ExamQuestion>,
    pub created_at: DateTime<Utc>,
}

impl Exam {
    pub fn exam_question(&self, id: ExamQuestionId) -> Option<&ExamQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// Exam-taking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptMode {
    /// Immediate per-answer feedback.
    Practice,
    /// Feedback deferred to submission.
    Simulation,
}

impl fmt::Display for AttemptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptMode::Practice => write!(f, "practice"),
            AttemptMode::Simulation => write!(f, "simulation"),
        }
    }
}

impl FromStr for AttemptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "practice" => Ok(AttemptMode::Practice),
            "simulation" => Ok(AttemptMode::Simulation),
            other => Err(format!("unknown attempt mode: {other}")),
        }
    }
}

/// A test-taker's response to one exam question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub choice_ids: Vec<ChoiceId>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Answer {
    pub fn choices(ids: impl IntoIterator<Item = ChoiceId>) -> Self {
        Self {
            choice_ids: ids.into_iter().collect(),
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            choice_ids: Vec::new(),
            text: Some(text.into()),
        }
    }

    /// No choice selected and no non-blank text.
    pub fn is_blank(&self) -> bool {
        self.choice_ids.is_empty()
            && self
                .text
                .as_deref()
                .map(|t| t.trim().is_empty())
                .unwrap_or(true)
    }
}

/// One test-taker's run through one exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub exam_id: ExamId,
    pub taker: String,
    pub mode: AttemptMode,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score_percent: Option<u32>,
    /// At most one answer per exam question; a resubmission overwrites.
    #[serde(default)]
    pub answers: BTreeMap<ExamQuestionId, Answer>,
    /// Bumped on every saved answer.
    #[serde(default)]
    pub revision: u64,
}

impl Attempt {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}
