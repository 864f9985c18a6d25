//! The store's full state and the operations on it.
//!
//! Every mutation is a plain method on [`StoreState`]. Backends apply a
//! mutation to a copy and swap it in only on success, so a failed operation
//! leaves the state untouched.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use recap_core::model::{
    Answer, Attempt, AttemptId, AttemptMode, CourseRecord, Exam, ExamDraft, ExamId,
    ExamQuestion, ExamQuestionId, Question, QuestionBank, QuestionId,
};

use crate::error::StoreError;

/// Snapshot layout version written by the JSON backend.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEntry {
    pub record: CourseRecord,
    pub question_ids: BTreeSet<QuestionId>,
    pub exam_ids: BTreeSet<ExamId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreState {
    pub format_version: u32,
    next_question_id: QuestionId,
    next_exam_id: ExamId,
    next_exam_question_id: ExamQuestionId,
    next_attempt_id: AttemptId,
    #[serde(default)]
    courses: BTreeMap<String, CourseEntry>,
    #[serde(default)]
    questions: BTreeMap<QuestionId, Question>,
    #[serde(default)]
    exams: BTreeMap<ExamId, Exam>,
    #[serde(default)]
    attempts: BTreeMap<AttemptId, Attempt>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            next_question_id: 1,
            next_exam_id: 1,
            next_exam_question_id: 1,
            next_attempt_id: 1,
            courses: BTreeMap::new(),
            questions: BTreeMap::new(),
            exams: BTreeMap::new(),
            attempts: BTreeMap::new(),
        }
    }
}

impl StoreState {
    pub fn allocate_question_ids(&mut self, count: usize) -> Vec<QuestionId> {
        let start = self.next_question_id;
        self.next_question_id += count as QuestionId;
        (start..self.next_question_id).collect()
    }

    pub fn commit_bank(
        &mut self,
        bank: &QuestionBank,
        drafts: &[ExamDraft],
        now: DateTime<Utc>,
    ) -> Result<Vec<Exam>, StoreError> {
        let code = bank.course.code.as_str();
        let ids = self.check_new_question_ids(code, &bank.questions)?;
        check_draft_questions(code, drafts, &ids)?;

        if let Some(old) = self.courses.remove(code) {
            for qid in &old.question_ids {
                self.questions.remove(qid);
            }
            for eid in &old.exam_ids {
                self.exams.remove(eid);
            }
        }

        for q in &bank.questions {
            self.questions.insert(q.id, q.clone());
        }
        let exams = self.insert_exams(code, drafts, now);

        self.courses.insert(
            code.to_string(),
            CourseEntry {
                record: CourseRecord {
                    course: bank.course.clone(),
                    metadata: bank.metadata.clone(),
                    fingerprint: bank.fingerprint.clone(),
                    ingested_at: now,
                },
                question_ids: ids,
                exam_ids: exams.iter().map(|e| e.id).collect(),
            },
        );
        Ok(exams)
    }

    pub fn replace_exams(
        &mut self,
        course_code: &str,
        drafts: &[ExamDraft],
        now: DateTime<Utc>,
    ) -> Result<Vec<Exam>, StoreError> {
        let entry = self
            .courses
            .get(course_code)
            .ok_or_else(|| StoreError::CourseNotFound(course_code.to_string()))?;
        check_draft_questions(course_code, drafts, &entry.question_ids)?;

        let old_exams: Vec<ExamId> = entry.exam_ids.iter().copied().collect();
        for eid in old_exams {
            self.exams.remove(&eid);
        }
        let exams = self.insert_exams(course_code, drafts, now);
        if let Some(entry) = self.courses.get_mut(course_code) {
            entry.exam_ids = exams.iter().map(|e| e.id).collect();
        }
        Ok(exams)
    }

    fn check_new_question_ids(
        &self,
        course_code: &str,
        questions: &[Question],
    ) -> Result<BTreeSet<QuestionId>, StoreError> {
        let invalid = |detail: String| StoreError::InvalidQuestionIds {
            course: course_code.to_string(),
            detail,
        };
        let own = self.courses.get(course_code).map(|e| &e.question_ids);

        let mut ids = BTreeSet::new();
        for q in questions {
            if q.id == 0 || q.id >= self.next_question_id {
                return Err(invalid(format!("question id {} was never allocated", q.id)));
            }
            if !ids.insert(q.id) {
                return Err(invalid(format!("question id {} repeats", q.id)));
            }
            let owned_here = own.is_some_and(|set| set.contains(&q.id));
            if self.questions.contains_key(&q.id) && !owned_here {
                return Err(invalid(format!("question id {} belongs to another course", q.id)));
            }
        }
        Ok(ids)
    }

    fn insert_exams(
        &mut self,
        course_code: &str,
        drafts: &[ExamDraft],
        now: DateTime<Utc>,
    ) -> Vec<Exam> {
        let mut exams = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = self.next_exam_id;
            self.next_exam_id += 1;

            let questions = draft
                .questions
                .iter()
                .map(|dq| {
                    let eq_id = self.next_exam_question_id;
                    self.next_exam_question_id += 1;
                    ExamQuestion {
                        id: eq_id,
                        question_id: dq.question_id,
                        domain: dq.domain.clone(),
                        order: dq.order,
                    }
                })
                .collect();

            let exam = Exam {
                id,
                course_code: course_code.to_string(),
                title: draft.title.clone(),
                index: draft.index,
                seed: draft.seed,
                bank_version: draft.bank_version.clone(),
                questions_per_exam: draft.questions_per_exam,
                exam_time_minutes: draft.exam_time_minutes,
                passing_score: draft.passing_score,
                domain_weights: draft.domain_weights.clone(),
                questions,
                created_at: now,
            };
            self.exams.insert(id, exam.clone());
            exams.push(exam);
        }
        exams
    }

    pub fn course(&self, code: &str) -> Option<CourseRecord> {
        self.courses.get(code).map(|e| e.record.clone())
    }

    pub fn courses(&self) -> Vec<CourseRecord> {
        self.courses.values().map(|e| e.record.clone()).collect()
    }

    pub fn questions(&self, course_code: &str) -> Vec<Question> {
        self.courses
            .get(course_code)
            .map(|e| {
                e.question_ids
                    .iter()
                    .filter_map(|id| self.questions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn question(&self, id: QuestionId) -> Option<Question> {
        self.questions.get(&id).cloned()
    }

    pub fn exams_for_course(&self, course_code: &str) -> Vec<Exam> {
        let mut exams: Vec<Exam> = self
            .courses
            .get(course_code)
            .map(|e| {
                e.exam_ids
                    .iter()
                    .filter_map(|id| self.exams.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        exams.sort_by_key(|e| e.index);
        exams
    }

    pub fn exam(&self, id: ExamId) -> Option<Exam> {
        self.exams.get(&id).cloned()
    }

    pub fn create_attempt(
        &mut self,
        exam_id: ExamId,
        taker: &str,
        mode: AttemptMode,
        started_at: DateTime<Utc>,
    ) -> Result<Attempt, StoreError> {
        if !self.exams.contains_key(&exam_id) {
            return Err(StoreError::ExamNotFound(exam_id));
        }
        let id = self.next_attempt_id;
        self.next_attempt_id += 1;
        let attempt = Attempt {
            id,
            exam_id,
            taker: taker.to_string(),
            mode,
            started_at,
            completed_at: None,
            score_percent: None,
            answers: BTreeMap::new(),
            revision: 0,
        };
        self.attempts.insert(id, attempt.clone());
        Ok(attempt)
    }

    pub fn attempt(&self, id: AttemptId) -> Option<Attempt> {
        self.attempts.get(&id).cloned()
    }

    pub fn save_answer(
        &mut self,
        attempt_id: AttemptId,
        exam_question_id: ExamQuestionId,
        answer: Answer,
    ) -> Result<(), StoreError> {
        let attempt = self.open_attempt_mut(attempt_id)?;
        attempt.answers.insert(exam_question_id, answer);
        attempt.revision += 1;
        Ok(())
    }

    pub fn complete_attempt(
        &mut self,
        attempt_id: AttemptId,
        revision: u64,
        score_percent: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<Attempt, StoreError> {
        let attempt = self.open_attempt_mut(attempt_id)?;
        if attempt.revision != revision {
            return Err(StoreError::AttemptChanged {
                attempt_id,
                expected: revision,
                found: attempt.revision,
            });
        }
        attempt.completed_at = Some(completed_at);
        attempt.score_percent = Some(score_percent);
        Ok(attempt.clone())
    }

    fn open_attempt_mut(&mut self, attempt_id: AttemptId) -> Result<&mut Attempt, StoreError> {
        let attempt = self
            .attempts
            .get_mut(&attempt_id)
            .ok_or(StoreError::AttemptNotFound(attempt_id))?;
        if attempt.is_completed() {
            return Err(StoreError::AttemptCompleted(attempt_id));
        }
        Ok(attempt)
    }

    pub fn completed_attempts(&self) -> Vec<Attempt> {
        self.attempts
            .values()
            .filter(|a| a.is_completed())
            .cloned()
            .collect()
    }

    pub fn attempts_for_taker(&self, taker: &str) -> Vec<Attempt> {
        let mut attempts: Vec<Attempt> = self
            .attempts
            .values()
            .filter(|a| a.taker == taker && a.is_completed())
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(b.id.cmp(&a.id)));
        attempts
    }

    pub fn attempts_for_course(&self, course_code: &str) -> Vec<Attempt> {
        let Some(entry) = self.courses.get(course_code) else {
            return Vec::new();
        };
        self.attempts
            .values()
            .filter(|a| entry.exam_ids.contains(&a.exam_id))
            .cloned()
            .collect()
    }

    pub fn set_validity_scores(&mut self, scores: &BTreeMap<QuestionId, f64>) -> usize {
        let mut updated = 0;
        for (id, score) in scores {
            if let Some(q) = self.questions.get_mut(id) {
                q.validity_score = Some(*score);
                updated += 1;
            }
        }
        updated
    }

    pub fn set_flagged(&mut self, question_id: QuestionId, flagged: bool) -> Result<(), StoreError> {
        let q = self
            .questions
            .get_mut(&question_id)
            .ok_or(StoreError::QuestionNotFound(question_id))?;
        q.flagged = flagged;
        Ok(())
    }
}

fn check_draft_questions(
    course_code: &str,
    drafts: &[ExamDraft],
    course_ids: &BTreeSet<QuestionId>,
) -> Result<(), StoreError> {
    for draft in drafts {
        if let Some(dq) = draft
            .questions
            .iter()
            .find(|dq| !course_ids.contains(&dq.question_id))
        {
            return Err(StoreError::InvalidQuestionIds {
                course: course_code.to_string(),
                detail: format!(
                    "exam {} references question {} outside the bank",
                    draft.index, dq.question_id
                ),
            });
        }
    }
    Ok(())
}
