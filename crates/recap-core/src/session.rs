//! Exam-taking sessions.
//!
//! A session is an [`Attempt`] plus the rules around it: only the taker who
//! started it may touch it, completed attempts are read-only, practice mode
//! answers come back with feedback and simulation mode answers do not.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::grading::{self, AnswerFeedback, ExamSubmissionResult, GradedItem};
use crate::model::{
    Answer, Attempt, AttemptId, AttemptMode, ChoiceId, Exam, ExamId, ExamQuestionId, InputMethod,
    Question, QuestionId, QuestionType,
};
use crate::traits::ExamStore;

/// A choice as shown to the taker, without its correctness flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentedChoice {
    pub id: ChoiceId,
    pub label: char,
    pub text: String,
}

/// A question as shown to the taker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionQuestion {
    pub exam_question_id: ExamQuestionId,
    pub order: u32,
    pub question_id: QuestionId,
    pub domain: String,
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_block: Option<String>,
    pub input_method: InputMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<PresentedChoice>,
}

impl SessionQuestion {
    fn present(exam_question_id: ExamQuestionId, order: u32, q: &Question) -> Self {
        Self {
            exam_question_id,
            order,
            question_id: q.id,
            domain: q.domain.clone(),
            question_type: q.question_type,
            text: q.text.clone(),
            image_url: q.image_url.clone(),
            code_block: q.code_block.clone(),
            input_method: q.input_method,
            choices: q
                .choices
                .iter()
                .map(|c| PresentedChoice {
                    id: c.id,
                    label: c.label,
                    text: c.text.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedSession {
    pub attempt: Attempt,
    pub exam_title: String,
    pub time_limit_minutes: u32,
    pub questions: Vec<SessionQuestion>,
}

/// Result of recording one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Simulation mode: stored, no feedback until submission.
    Saved,
    Feedback(AnswerFeedback),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub completed: bool,
    pub answered_count: usize,
    pub remaining_count: usize,
    /// `HH:MM:SS`, never negative.
    pub time_remaining: String,
}

/// Grading rounds before `submit` gives up on an attempt that keeps changing.
const SUBMIT_ATTEMPTS: usize = 3;

/// Every selected choice must belong to the question.
fn check_choices(
    question: &Question,
    exam_question_id: ExamQuestionId,
    answer: &Answer,
) -> std::result::Result<(), SessionError> {
    match answer
        .choice_ids
        .iter()
        .find(|id| !question.choices.iter().any(|c| c.id == **id))
    {
        Some(&choice_id) => Err(SessionError::UnknownChoice {
            exam_question_id,
            choice_id,
        }),
        None => Ok(()),
    }
}

/// Format a duration as `HH:MM:SS`, clamping negatives to zero.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Session operations over a store.
pub struct ExamSessions {
    store: Arc<dyn ExamStore>,
}

impl ExamSessions {
    pub fn new(store: Arc<dyn ExamStore>) -> Self {
        Self { store }
    }

    /// Begin an attempt and return the exam's questions in order.
    pub async fn start(
        &self,
        exam_id: ExamId,
        taker: &str,
        mode: AttemptMode,
        now: DateTime<Utc>,
    ) -> Result<StartedSession> {
        let exam = self
            .store
            .exam(exam_id)
            .await?
            .ok_or(SessionError::ExamNotFound(exam_id))?;

        let mut questions = Vec::with_capacity(exam.questions.len());
        for eq in &exam.questions {
            let q = self.load_question(eq.question_id).await?;
            questions.push(SessionQuestion::present(eq.id, eq.order, &q));
        }

        let attempt = self.store.create_attempt(exam_id, taker, mode, now).await?;
        tracing::info!(
            attempt_id = attempt.id,
            exam_id,
            %mode,
            "exam session started"
        );

        Ok(StartedSession {
            attempt,
            exam_title: exam.title,
            time_limit_minutes: exam.exam_time_minutes,
            questions,
        })
    }

    /// Store an answer. Practice mode returns immediate feedback.
    pub async fn record_answer(
        &self,
        attempt_id: AttemptId,
        taker: &str,
        exam_question_id: ExamQuestionId,
        answer: Answer,
    ) -> Result<RecordOutcome> {
        let attempt = self.open_attempt(attempt_id, taker).await?;
        let exam = self.load_exam(attempt.exam_id).await?;
        let eq = exam
            .exam_question(exam_question_id)
            .ok_or(SessionError::QuestionNotInExam {
                attempt_id,
                exam_question_id,
            })?;
        let question = self.load_question(eq.question_id).await?;
        check_choices(&question, exam_question_id, &answer)?;

        let outcome = match attempt.mode {
            AttemptMode::Practice => {
                RecordOutcome::Feedback(grading::practice_feedback(&question, &answer))
            }
            AttemptMode::Simulation => RecordOutcome::Saved,
        };
        self.store
            .save_answer(attempt_id, exam_question_id, answer)
            .await?;
        Ok(outcome)
    }

    pub async fn status(
        &self,
        attempt_id: AttemptId,
        taker: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus> {
        let attempt = self.owned_attempt(attempt_id, taker).await?;
        let exam = self.load_exam(attempt.exam_id).await?;

        let answered_count = attempt
            .answers
            .iter()
            .filter(|(id, a)| exam.exam_question(**id).is_some() && !a.is_blank())
            .count();
        let remaining_count = exam.questions.len().saturating_sub(answered_count);

        let time_remaining = if attempt.is_completed() {
            format_remaining(Duration::zero())
        } else {
            let deadline =
                attempt.started_at + Duration::minutes(i64::from(exam.exam_time_minutes));
            format_remaining(deadline - now)
        };

        Ok(SessionStatus {
            completed: attempt.is_completed(),
            answered_count,
            remaining_count,
            time_remaining,
        })
    }

    /// Grade every exam question and complete the attempt.
    ///
    /// Completion is conditional on the attempt's revision, so an answer saved
    /// while grading forces a regrade instead of being dropped.
    pub async fn submit(
        &self,
        attempt_id: AttemptId,
        taker: &str,
        now: DateTime<Utc>,
    ) -> Result<ExamSubmissionResult> {
        let mut attempt = self.open_attempt(attempt_id, taker).await?;
        let exam = self.load_exam(attempt.exam_id).await?;

        let mut questions = Vec::with_capacity(exam.questions.len());
        for eq in &exam.questions {
            questions.push(self.load_question(eq.question_id).await?);
        }

        for _ in 0..SUBMIT_ATTEMPTS {
            let items = exam
                .questions
                .iter()
                .zip(&questions)
                .map(|(eq, question)| GradedItem {
                    exam_question_id: eq.id,
                    question,
                    answer: attempt.answers.get(&eq.id),
                });
            let result = grading::grade_submission(items, exam.passing_score);

            let completed = self
                .store
                .complete_attempt(attempt_id, attempt.revision, result.score_percent, now)
                .await;
            match completed {
                Ok(_) => {
                    tracing::info!(
                        attempt_id,
                        exam_id = exam.id,
                        score = result.score_percent,
                        pass = result.pass,
                        "exam session submitted"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    let latest = self.open_attempt(attempt_id, taker).await?;
                    if latest.revision == attempt.revision {
                        return Err(e);
                    }
                    tracing::debug!(
                        attempt_id,
                        graded = attempt.revision,
                        latest = latest.revision,
                        "answers changed during submission, regrading"
                    );
                    attempt = latest;
                }
            }
        }
        Err(SessionError::SubmitConflict(attempt_id).into())
    }

    /// Manual review flag on a question.
    pub async fn set_flagged(&self, question_id: QuestionId, flagged: bool) -> Result<()> {
        self.load_question(question_id).await?;
        self.store.set_flagged(question_id, flagged).await?;
        tracing::info!(question_id, flagged, "question review flag changed");
        Ok(())
    }

    async fn owned_attempt(&self, attempt_id: AttemptId, taker: &str) -> Result<Attempt> {
        let attempt = self
            .store
            .attempt(attempt_id)
            .await?
            .ok_or(SessionError::AttemptNotFound(attempt_id))?;
        if attempt.taker != taker {
            return Err(SessionError::AccessDenied(attempt_id).into());
        }
        Ok(attempt)
    }

    async fn open_attempt(&self, attempt_id: AttemptId, taker: &str) -> Result<Attempt> {
        let attempt = self.owned_attempt(attempt_id, taker).await?;
        if attempt.is_completed() {
            return Err(SessionError::AlreadyCompleted(attempt_id).into());
        }
        Ok(attempt)
    }

    async fn load_exam(&self, exam_id: ExamId) -> Result<Exam> {
        Ok(self
            .store
            .exam(exam_id)
            .await?
            .ok_or(SessionError::ExamNotFound(exam_id))?)
    }

    async fn load_question(&self, question_id: QuestionId) -> Result<Question> {
        Ok(self
            .store
            .question(question_id)
            .await?
            .ok_or(SessionError::QuestionNotFound(question_id))?)
    }
}
