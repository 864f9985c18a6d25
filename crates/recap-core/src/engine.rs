//! Exam generation orchestrator.
//!
//! [`generate_exams`] turns a question pool into exam drafts without touching
//! storage. [`GenerationEngine`] wraps it with the store so that a bank and
//! its exams are committed together or not at all.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GenerationError;
use crate::model::{BankMetadata, Course, Exam, ExamDraft, Question, QuestionBank, QuestionId};
use crate::planner::{self, ExamPlan};
use crate::selector::{exam_seed, ReuseScope, Selector};
use crate::traits::ExamStore;

/// Drafts produced for one course and bank version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedExams {
    pub plan: ExamPlan,
    pub drafts: Vec<ExamDraft>,
}

pub fn exam_title(marketing_name: &str, index: usize) -> String {
    format!("{marketing_name} Practice Exam {}", index + 1)
}

/// Plan, select and verify every exam for a pool.
pub fn generate_exams(
    course: &Course,
    metadata: &BankMetadata,
    questions: &[Question],
    scope: ReuseScope,
) -> Result<GeneratedExams, GenerationError> {
    let course_code = course.code.as_str();
    let bank_version = metadata.bank_version.as_str();

    if questions.is_empty() {
        return Err(GenerationError::EmptyPool {
            course: course_code.to_string(),
            bank_version: bank_version.to_string(),
        });
    }

    let plan = planner::plan_exams(
        questions,
        metadata.min_questions,
        metadata.max_questions,
        &metadata.domains,
        scope,
    )
    .map_err(|source| GenerationError::Plan {
        course: course_code.to_string(),
        bank_version: bank_version.to_string(),
        source,
    })?;

    tracing::info!(
        course = course_code,
        bank_version,
        questions_per_exam = plan.questions_per_exam,
        num_exams = plan.num_exams,
        unused = plan.unused_questions,
        quota = ?plan.per_domain_quota,
        %scope,
        "exam plan chosen"
    );

    let mut selector = Selector::new(questions, scope);
    let mut batch_seen: BTreeSet<QuestionId> = BTreeSet::new();
    let mut drafts = Vec::with_capacity(plan.num_exams);

    for index in 0..plan.num_exams {
        let seed = exam_seed(bank_version, &course.marketing_name, index);
        let selected = selector.select(index, seed, &plan.per_domain_quota).map_err(|source| {
            tracing::error!(
                course = course_code,
                bank_version,
                exam_index = index,
                error = %source,
                "selection could not meet the plan"
            );
            GenerationError::Selection {
                course: course_code.to_string(),
                bank_version: bank_version.to_string(),
                source,
            }
        })?;

        let draft = ExamDraft {
            index,
            title: exam_title(&course.marketing_name, index),
            seed,
            bank_version: bank_version.to_string(),
            questions_per_exam: plan.questions_per_exam,
            exam_time_minutes: metadata.exam_time_minutes,
            passing_score: metadata.passing_score,
            domain_weights: metadata.domains.clone(),
            questions: selected,
        };

        if let Err(detail) = verify_draft(&plan, &draft, scope, &mut batch_seen) {
            tracing::error!(
                course = course_code,
                bank_version,
                exam_index = index,
                %detail,
                "generated exam violates its plan"
            );
            return Err(GenerationError::Integrity {
                course: course_code.to_string(),
                bank_version: bank_version.to_string(),
                exam_index: index,
                detail,
            });
        }

        tracing::debug!(course = course_code, exam_index = index, seed, "exam drafted");
        drafts.push(draft);
    }

    Ok(GeneratedExams { plan, drafts })
}

fn verify_draft(
    plan: &ExamPlan,
    draft: &ExamDraft,
    scope: ReuseScope,
    batch_seen: &mut BTreeSet<QuestionId>,
) -> std::result::Result<(), String> {
    if draft.questions.len() != plan.questions_per_exam {
        return Err(format!(
            "has {} questions, plan requires {}",
            draft.questions.len(),
            plan.questions_per_exam
        ));
    }

    let counts = draft.domain_counts();
    for (domain, &quota) in &plan.per_domain_quota {
        let got = counts.get(domain.as_str()).copied().unwrap_or(0);
        if got != quota {
            return Err(format!("domain '{domain}' has {got} questions, quota is {quota}"));
        }
    }
    if let Some(extra) = counts
        .keys()
        .find(|d| !plan.per_domain_quota.contains_key(**d))
    {
        return Err(format!("domain '{extra}' is not part of the plan"));
    }

    let mut in_exam = BTreeSet::new();
    for q in &draft.questions {
        if !in_exam.insert(q.question_id) {
            return Err(format!("question {} appears twice", q.question_id));
        }
    }

    if scope == ReuseScope::PerBatch {
        if let Some(reused) = in_exam.iter().find(|id| batch_seen.contains(*id)) {
            return Err(format!("question {reused} was already used in this batch"));
        }
        batch_seen.extend(in_exam);
    }
    Ok(())
}

/// What one ingestion or regeneration committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: Uuid,
    pub course_code: String,
    pub bank_version: String,
    pub question_count: usize,
    pub plan: ExamPlan,
    pub exams: Vec<Exam>,
}

/// Generation backed by an [`ExamStore`].
pub struct GenerationEngine {
    store: Arc<dyn ExamStore>,
    scope: ReuseScope,
}

impl GenerationEngine {
    pub fn new(store: Arc<dyn ExamStore>, scope: ReuseScope) -> Self {
        Self { store, scope }
    }

    pub fn scope(&self) -> ReuseScope {
        self.scope
    }

    /// Persist a validated bank and its freshly generated exams.
    ///
    /// Nothing is written unless generation succeeds.
    pub async fn ingest(&self, mut bank: QuestionBank) -> Result<GenerationReport> {
        let run_id = Uuid::new_v4();
        let course_code = bank.course.code.clone();
        tracing::info!(
            %run_id,
            course = %course_code,
            questions = bank.questions.len(),
            "ingesting bank"
        );

        let ids = self
            .store
            .allocate_question_ids(bank.questions.len())
            .await
            .with_context(|| format!("failed to allocate question ids for '{course_code}'"))?;
        bank.assign_ids(&ids)?;

        let generated = generate_exams(&bank.course, &bank.metadata, &bank.questions, self.scope)?;

        let exams = self
            .store
            .commit_bank(&bank, &generated.drafts)
            .await
            .with_context(|| format!("failed to commit bank for '{course_code}'"))?;

        tracing::info!(
            %run_id,
            course = %course_code,
            bank_version = %bank.metadata.bank_version,
            exams = exams.len(),
            "bank committed"
        );

        Ok(GenerationReport {
            run_id,
            course_code,
            bank_version: bank.metadata.bank_version,
            question_count: bank.questions.len(),
            plan: generated.plan,
            exams,
        })
    }

    /// Rebuild a course's exams from its stored questions.
    pub async fn regenerate(&self, course_code: &str) -> Result<GenerationReport> {
        let run_id = Uuid::new_v4();
        let record = self
            .store
            .course(course_code)
            .await?
            .with_context(|| format!("course '{course_code}' not found"))?;
        let questions = self.store.questions(course_code).await?;

        let generated = generate_exams(&record.course, &record.metadata, &questions, self.scope)?;
        let exams = self
            .store
            .replace_exams(course_code, &generated.drafts)
            .await
            .with_context(|| format!("failed to replace exams for '{course_code}'"))?;

        tracing::info!(%run_id, course = course_code, exams = exams.len(), "exams regenerated");

        Ok(GenerationReport {
            run_id,
            course_code: course_code.to_string(),
            bank_version: record.metadata.bank_version,
            question_count: questions.len(),
            plan: generated.plan,
            exams,
        })
    }
}

/// Index questions by id.
pub fn index_questions(questions: Vec<Question>) -> BTreeMap<QuestionId, Question> {
    questions.into_iter().map(|q| (q.id, q)).collect()
}
