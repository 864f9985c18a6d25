//! Typed errors of the planning, selection, ingestion and session paths.
//!
//! Orchestration code wraps these in `anyhow::Error`; callers that need to
//! classify a failure (e.g. the ingestion job deciding whether to retry)
//! recover them with `downcast_ref`.

use std::fmt;

use thiserror::Error;

use crate::model::{AttemptId, ChoiceId, ExamId, ExamQuestionId, QuestionId};

/// A malformed domain-weight string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightError {
    #[error("domain list is empty")]
    Empty,

    #[error("invalid domain format: '{0}', expected 'Name:Weight'")]
    MalformedPair(String),

    #[error("invalid weight for domain '{domain}': {value}")]
    InvalidWeight { domain: String, value: String },

    #[error("domain weight for '{domain}' must be between 0.0 and 1.0, got {weight}")]
    OutOfRange { domain: String, weight: f64 },

    #[error("domain '{0}' is listed more than once")]
    DuplicateDomain(String),

    #[error("domain weights do not sum to 1.0 (sum is {sum:.2})")]
    BadSum { sum: f64 },
}

/// No usable exam size exists for the pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("invalid question bounds: min {min}, max {max}")]
    InvalidBounds { min: usize, max: usize },

    #[error(
        "insufficient questions to form any valid exam with {min}..={max} questions \
         per exam ({total} questions available)"
    )]
    InsufficientQuestions {
        min: usize,
        max: usize,
        total: usize,
    },
}

/// A domain could not supply the quota its plan promised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error(
        "not enough unique questions in domain '{domain}' for exam {exam_index} \
         (available: {available}, required: {required})"
    )]
    DomainExhausted {
        exam_index: usize,
        domain: String,
        available: usize,
        required: usize,
    },
}

/// Exam generation for one course and bank version failed.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no questions available for course '{course}' version '{bank_version}'")]
    EmptyPool { course: String, bank_version: String },

    #[error("exam planning failed for course '{course}' version '{bank_version}'")]
    Plan {
        course: String,
        bank_version: String,
        #[source]
        source: PlanError,
    },

    #[error("question selection failed for course '{course}' version '{bank_version}'")]
    Selection {
        course: String,
        bank_version: String,
        #[source]
        source: SelectionError,
    },

    #[error(
        "exam {exam_index} of course '{course}' version '{bank_version}' does not match \
         its plan: {detail}"
    )]
    Integrity {
        course: String,
        bank_version: String,
        exam_index: usize,
        detail: String,
    },
}

/// One problem found while reading an exam bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankIssue {
    /// 1-based line in `exam_bank.csv`, when the issue belongs to a row.
    pub line: Option<usize>,
    pub field: Option<String>,
    pub message: String,
    pub suggested_fix: Option<String>,
}

impl BankIssue {
    pub fn new(line: Option<usize>, field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            line,
            field: field.map(str::to_string),
            message: message.into(),
            suggested_fix: None,
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

impl fmt::Display for BankIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {line}: ")?;
        }
        if let Some(field) = &self.field {
            write!(f, "[{field}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(fix) = &self.suggested_fix {
            write!(f, " ({fix})")?;
        }
        Ok(())
    }
}

/// An exam bank was rejected. Nothing from it may be persisted.
#[derive(Debug, Clone, Error)]
#[error("exam bank for course '{course}' rejected with {} issue(s); first: {}", .issues.len(), first_issue(.issues))]
pub struct BankError {
    pub course: String,
    pub issues: Vec<BankIssue>,
}

fn first_issue(issues: &[BankIssue]) -> String {
    issues
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".into())
}

/// A request against an exam session was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("exam {0} not found")]
    ExamNotFound(ExamId),

    #[error("exam session {0} not found")]
    AttemptNotFound(AttemptId),

    #[error("access denied to exam session {0}")]
    AccessDenied(AttemptId),

    #[error("exam session {0} is already completed")]
    AlreadyCompleted(AttemptId),

    #[error("question {exam_question_id} is not part of exam session {attempt_id}")]
    QuestionNotInExam {
        attempt_id: AttemptId,
        exam_question_id: ExamQuestionId,
    },

    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),

    #[error("choice {choice_id} does not belong to question {exam_question_id}")]
    UnknownChoice {
        exam_question_id: ExamQuestionId,
        choice_id: ChoiceId,
    },

    /// Answers kept arriving while the submission was being graded.
    #[error("exam session {0} changed during submission, submit again")]
    SubmitConflict(AttemptId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_issue_display() {
        let issue = BankIssue::new(Some(12), Some("domain"), "Domain not defined in metadata")
            .with_fix("add it to the 'domains' row");
        assert_eq!(
            issue.to_string(),
            "line 12: [domain] Domain not defined in metadata (add it to the 'domains' row)"
        );
    }

    #[test]
    fn bank_error_mentions_first_issue() {
        let err = BankError {
            course: "k8s".into(),
            issues: vec![
                BankIssue::new(Some(7), None, "Missing required field"),
                BankIssue::new(Some(9), None, "Duplicate question text"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 issue(s)"));
        assert!(msg.contains("line 7"));
    }

    #[test]
    fn selection_error_names_domain_and_counts() {
        let err = SelectionError::DomainExhausted {
            exam_index: 3,
            domain: "Storage".into(),
            available: 1,
            required: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("'Storage'"));
        assert!(msg.contains("available: 1"));
        assert!(msg.contains("required: 2"));
    }
}
