//! Lock-guarded store over [`StoreState`].
//!
//! Reads take the read lock. Writes take the write lock, apply the mutation
//! to a copy, hand the copy to the [`Snapshot`] sink and only then replace
//! the live state. Readers therefore see the old state or the new one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use recap_core::model::{
    Answer, Attempt, AttemptId, AttemptMode, CourseRecord, Exam, ExamDraft, ExamId,
    ExamQuestionId, Question, QuestionBank, QuestionId,
};
use recap_core::traits::ExamStore;

use crate::error::StoreError;
use crate::state::StoreState;

/// Where a committed state goes before it becomes visible.
#[async_trait]
pub trait Snapshot: Send + Sync {
    fn backend(&self) -> &str;

    async fn persist(&self, state: &StoreState) -> anyhow::Result<()>;
}

/// Keeps nothing beyond process memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct Volatile;

#[async_trait]
impl Snapshot for Volatile {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn persist(&self, _state: &StoreState) -> anyhow::Result<()> {
        Ok(())
    }
}

/// An [`ExamStore`] over one guarded [`StoreState`].
pub struct StateStore<S> {
    state: RwLock<StoreState>,
    sink: S,
}

/// The in-process store.
pub type MemoryStore = StateStore<Volatile>;

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_state(StoreState::default(), Volatile)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Snapshot> StateStore<S> {
    pub fn with_state(state: StoreState, sink: S) -> Self {
        Self {
            state: RwLock::new(state),
            sink,
        }
    }

    async fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let guard = self.state.read().await;
        f(&*guard)
    }

    async fn write<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> anyhow::Result<T> {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.sink.persist(&next).await?;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl<S: Snapshot> ExamStore for StateStore<S> {
    fn name(&self) -> &str {
        self.sink.backend()
    }

    async fn allocate_question_ids(&self, count: usize) -> anyhow::Result<Vec<QuestionId>> {
        self.write(|s| Ok(s.allocate_question_ids(count))).await
    }

    async fn commit_bank(
        &self,
        bank: &QuestionBank,
        drafts: &[ExamDraft],
    ) -> anyhow::Result<Vec<Exam>> {
        let now = Utc::now();
        self.write(|s| s.commit_bank(bank, drafts, now)).await
    }

    async fn course(&self, code: &str) -> anyhow::Result<Option<CourseRecord>> {
        Ok(self.read(|s| s.course(code)).await)
    }

    async fn courses(&self) -> anyhow::Result<Vec<CourseRecord>> {
        Ok(self.read(|s| s.courses()).await)
    }

    async fn questions(&self, course_code: &str) -> anyhow::Result<Vec<Question>> {
        Ok(self.read(|s| s.questions(course_code)).await)
    }

    async fn question(&self, id: QuestionId) -> anyhow::Result<Option<Question>> {
        Ok(self.read(|s| s.question(id)).await)
    }

    async fn replace_exams(
        &self,
        course_code: &str,
        drafts: &[ExamDraft],
    ) -> anyhow::Result<Vec<Exam>> {
        let now = Utc::now();
        self.write(|s| s.replace_exams(course_code, drafts, now))
            .await
    }

    async fn exams_for_course(&self, course_code: &str) -> anyhow::Result<Vec<Exam>> {
        Ok(self.read(|s| s.exams_for_course(course_code)).await)
    }

    async fn exam(&self, id: ExamId) -> anyhow::Result<Option<Exam>> {
        Ok(self.read(|s| s.exam(id)).await)
    }

    async fn create_attempt(
        &self,
        exam_id: ExamId,
        taker: &str,
        mode: AttemptMode,
        started_at: DateTime<Utc>,
    ) -> anyhow::Result<Attempt> {
        self.write(|s| s.create_attempt(exam_id, taker, mode, started_at))
            .await
    }

    async fn attempt(&self, id: AttemptId) -> anyhow::Result<Option<Attempt>> {
        Ok(self.read(|s| s.attempt(id)).await)
    }

    async fn save_answer(
        &self,
        attempt_id: AttemptId,
        exam_question_id: ExamQuestionId,
        answer: Answer,
    ) -> anyhow::Result<()> {
        self.write(|s| s.save_answer(attempt_id, exam_question_id, answer))
            .await
    }

    async fn complete_attempt(
        &self,
        attempt_id: AttemptId,
        revision: u64,
        score_percent: u32,
        completed_at: DateTime<Utc>,
    ) -> anyhow::Result<Attempt> {
        self.write(|s| s.complete_attempt(attempt_id, revision, score_percent, completed_at))
            .await
    }

    async fn completed_attempts(&self) -> anyhow::Result<Vec<Attempt>> {
        Ok(self.read(|s| s.completed_attempts()).await)
    }

    async fn attempts_for_taker(&self, taker: &str) -> anyhow::Result<Vec<Attempt>> {
        Ok(self.read(|s| s.attempts_for_taker(taker)).await)
    }

    async fn attempts_for_course(&self, course_code: &str) -> anyhow::Result<Vec<Attempt>> {
        Ok(self.read(|s| s.attempts_for_course(course_code)).await)
    }

    async fn set_validity_scores(
        &self,
        scores: &BTreeMap<QuestionId, f64>,
    ) -> anyhow::Result<usize> {
        self.write(|s| Ok(s.set_validity_scores(scores))).await
    }

    async fn set_flagged(&self, question_id: QuestionId, flagged: bool) -> anyhow::Result<()> {
        self.write(|s| s.set_flagged(question_id, flagged)).await
    }
}
