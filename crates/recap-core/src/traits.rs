//! Storage seam.
//!
//! Implemented by the `recap-store` crate. Every method that writes more than
//! one record must apply all of it or none of it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
    Answer, Attempt, AttemptId, AttemptMode, CourseRecord, Exam, ExamDraft, ExamId,
    ExamQuestionId, Question, QuestionBank, QuestionId,
};

/// Persistence for courses, questions, exams and attempts.
#[async_trait]
pub trait ExamStore: Send + Sync {
    /// Backend name for logs (e.g. "memory").
    fn name(&self) -> &str;

    /// Reserve `count` fresh question identifiers.
    async fn allocate_question_ids(&self, count: usize) -> anyhow::Result<Vec<QuestionId>>;

    /// Replace a course's record, questions and exams in one unit of work.
    ///
    /// Question ids in `bank` must come from [`ExamStore::allocate_question_ids`].
    async fn commit_bank(&self, bank: &QuestionBank, drafts: &[ExamDraft])
        -> anyhow::Result<Vec<Exam>>;

    async fn course(&self, code: &str) -> anyhow::Result<Option<CourseRecord>>;

    async fn courses(&self) -> anyhow::Result<Vec<CourseRecord>>;

    /// Questions of the course's current bank, in id order.
    async fn questions(&self, course_code: &str) -> anyhow::Result<Vec<Question>>;

    async fn question(&self, id: QuestionId) -> anyhow::Result<Option<Question>>;

    /// Replace every exam of the course with `drafts` in one unit of work.
    async fn replace_exams(
        &self,
        course_code: &str,
        drafts: &[ExamDraft],
    ) -> anyhow::Result<Vec<Exam>>;

    /// Exams of the course, ordered by index.
    async fn exams_for_course(&self, course_code: &str) -> anyhow::Result<Vec<Exam>>;

    async fn exam(&self, id: ExamId) -> anyhow::Result<Option<Exam>>;

    async fn create_attempt(
        &self,
        exam_id: ExamId,
        taker: &str,
        mode: AttemptMode,
        started_at: DateTime<Utc>,
    ) -> anyhow::Result<Attempt>;

    async fn attempt(&self, id: AttemptId) -> anyhow::Result<Option<Attempt>>;

    /// Store an answer, overwriting any earlier one for the same exam question,
    /// and bump the attempt's revision.
    async fn save_answer(
        &self,
        attempt_id: AttemptId,
        exam_question_id: ExamQuestionId,
        answer: Answer,
    ) -> anyhow::Result<()>;

    /// Mark an attempt completed.
    ///
    /// Fails if it already is, or if its revision is no longer `revision`
    /// because an answer was saved after the caller read it.
    async fn complete_attempt(
        &self,
        attempt_id: AttemptId,
        revision: u64,
        score_percent: u32,
        completed_at: DateTime<Utc>,
    ) -> anyhow::Result<Attempt>;

    async fn completed_attempts(&self) -> anyhow::Result<Vec<Attempt>>;

    /// Completed attempts of one taker, most recently completed first.
    async fn attempts_for_taker(&self, taker: &str) -> anyhow::Result<Vec<Attempt>>;

    /// Every attempt, open or completed, on the course's current exams.
    async fn attempts_for_course(&self, course_code: &str) -> anyhow::Result<Vec<Attempt>>;

    /// Write validity scores; returns how many questions were updated.
    async fn set_validity_scores(&self, scores: &BTreeMap<QuestionId, f64>)
        -> anyhow::Result<usize>;

    async fn set_flagged(&self, question_id: QuestionId, flagged: bool) -> anyhow::Result<()>;
}
