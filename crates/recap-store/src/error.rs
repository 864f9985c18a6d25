//! Store error types.

use recap_core::model::{AttemptId, ExamId, QuestionId};
use thiserror::Error;

/// Errors raised by the store backends themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("course not found: {0}")]
    CourseNotFound(String),

    #[error("exam not found: {0}")]
    ExamNotFound(ExamId),

    #[error("attempt not found: {0}")]
    AttemptNotFound(AttemptId),

    #[error("question not found: {0}")]
    QuestionNotFound(QuestionId),

    /// Completion is terminal.
    #[error("attempt {0} is already completed")]
    AttemptCompleted(AttemptId),

    #[error("attempt {attempt_id} changed since it was read (revision {expected}, now {found})")]
    AttemptChanged {
        attempt_id: AttemptId,
        expected: u64,
        found: u64,
    },

    /// Ids in a commit were never allocated, repeat, or belong to another course.
    #[error("invalid question ids for course '{course}': {detail}")]
    InvalidQuestionIds { course: String, detail: String },

    #[error("snapshot format version {found} is not supported (expected {expected})")]
    UnsupportedSnapshot { found: u32, expected: u32 },
}
