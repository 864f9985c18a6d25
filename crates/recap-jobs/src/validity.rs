//! Validity scoring job.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use recap_core::engine::index_questions;
use recap_core::model::{Exam, ExamId, Question, QuestionId};
use recap_core::traits::ExamStore;
use recap_core::validity::{self, AttemptOutcomes, ValidityRun};

use crate::{Job, JobSummary};

pub struct ValidityJob {
    store: Arc<dyn ExamStore>,
    threshold: f64,
}

impl ValidityJob {
    pub fn new(store: Arc<dyn ExamStore>, threshold: f64) -> Self {
        Self { store, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Grade every completed attempt whose exam still exists.
    pub async fn collect_outcomes(&self) -> Result<Vec<AttemptOutcomes>> {
        let attempts = self.store.completed_attempts().await?;
        let mut exams: BTreeMap<ExamId, Option<Exam>> = BTreeMap::new();
        let mut pools: BTreeMap<String, BTreeMap<QuestionId, Question>> = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(attempts.len());
        let mut orphaned = 0usize;

        for attempt in &attempts {
            if !exams.contains_key(&attempt.exam_id) {
                let exam = self.store.exam(attempt.exam_id).await?;
                exams.insert(attempt.exam_id, exam);
            }
            let Some(Some(exam)) = exams.get(&attempt.exam_id) else {
                orphaned += 1;
                continue;
            };
            if !pools.contains_key(&exam.course_code) {
                let questions = self.store.questions(&exam.course_code).await?;
                pools.insert(exam.course_code.clone(), index_questions(questions));
            }
            let Some(pool) = pools.get(&exam.course_code) else {
                continue;
            };
            if let Some(o) = validity::attempt_outcomes(attempt, exam, pool) {
                outcomes.push(o);
            }
        }

        if orphaned > 0 {
            tracing::debug!(orphaned, "ignored attempts on replaced exams");
        }
        Ok(outcomes)
    }

    /// Compute and store validity scores. A skipped run writes nothing.
    pub async fn score(&self) -> Result<ValidityRun> {
        let outcomes = self.collect_outcomes().await?;
        let run = validity::compute_validity_scores(outcomes, self.threshold);

        match &run {
            ValidityRun::Skipped { reason } => {
                tracing::info!(%reason, "validity scoring skipped");
            }
            ValidityRun::Computed {
                low_group,
                high_group,
                scores,
            } => {
                let updated = self.store.set_validity_scores(scores).await?;
                let weak = scores.values().filter(|s| **s <= 0.0).count();
                tracing::info!(
                    low_group,
                    high_group,
                    scored = scores.len(),
                    updated,
                    weak,
                    "validity scores updated"
                );
            }
        }
        Ok(run)
    }
}

#[async_trait]
impl Job for ValidityJob {
    fn name(&self) -> &str {
        "validity"
    }

    async fn run(&self) -> Result<JobSummary> {
        let mut summary = JobSummary::new(self.name());
        match self.score().await? {
            ValidityRun::Skipped { reason } => {
                summary.skipped = 1;
                summary.notes.push(reason);
            }
            ValidityRun::Computed { scores, .. } => {
                summary.processed = scores.len();
                for (qid, score) in scores.iter().filter(|(_, s)| **s <= 0.0) {
                    summary
                        .notes
                        .push(format!("question {qid} does not discriminate (score {score:.2})"));
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use recap_core::engine::GenerationEngine;
    use recap_core::model::{
        Answer, AttemptMode, BankMetadata, Course, InputMethod, QuestionBank, QuestionType,
    };
    use recap_core::selector::ReuseScope;
    use recap_core::session::ExamSessions;
    use recap_core::weights::DomainWeights;
    use recap_store::MemoryStore;

    fn fill(n: usize) -> Question {
        Question {
            id: 0,
            domain: "Shell".into(),
            question_type: QuestionType::FillBlank,
            text: format!("command {n}"),
            explanation: "manual".into(),
            image_url: None,
            code_block: None,
            input_method: InputMethod::Text,
            choices: Vec::new(),
            acceptable_answers: vec![format!("answer{n}")],
            bank_version: "1.0.0".into(),
            validity_score: None,
            flagged: false,
        }
    }

    fn bank() -> QuestionBank {
        QuestionBank {
            course: Course {
                code: "lnx".into(),
                name: "Linux".into(),
                marketing_name: "Linux".into(),
                duration_days: 1,
                responsibility: String::new(),
            },
            metadata: BankMetadata {
                bank_version: "1.0.0".into(),
                min_questions: 4,
                max_questions: 4,
                exam_time_minutes: 15,
                passing_score: 50.0,
                domains: DomainWeights::parse("Shell:1.0").unwrap(),
            },
            questions: (0..4).map(fill).collect(),
            fingerprint: String::new(),
        }
    }

    /// Ingest one 4-question exam and have `takers` people submit it.
    /// The first two takers get everything wrong except the easy question,
    /// which every taker gets right.
    async fn populate(takers: usize) -> (Arc<dyn ExamStore>, QuestionId) {
        let store: Arc<dyn ExamStore> = Arc::new(MemoryStore::new());
        let engine = GenerationEngine::new(Arc::clone(&store), ReuseScope::PerExam);
        let report = engine.ingest(bank()).await.unwrap();
        let exam = &report.exams[0];
        let questions = index_questions(store.questions("lnx").await.unwrap());
        let easy = *questions.keys().next().unwrap();

        let sessions = ExamSessions::new(Arc::clone(&store));
        for t in 0..takers {
            let taker = format!("t{t}@example.com");
            let started = sessions
                .start(exam.id, &taker, AttemptMode::Simulation, Utc::now())
                .await
                .unwrap();
            for sq in &started.questions {
                let q = &questions[&sq.question_id];
                let text = if t < 2 && q.id != easy {
                    "wrong".to_string()
                } else {
                    q.acceptable_answers[0].clone()
                };
                sessions
                    .record_answer(started.attempt.id, &taker, sq.exam_question_id, Answer::text(text))
                    .await
                    .unwrap();
            }
            sessions
                .submit(started.attempt.id, &taker, Utc::now())
                .await
                .unwrap();
        }
        (store, easy)
    }

    #[tokio::test]
    async fn scores_separate_easy_from_discriminating_questions() {
        let (store, easy) = populate(10).await;
        let job = ValidityJob::new(Arc::clone(&store), 0.25);

        let summary = job.run().await.unwrap();
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.notes.len(), 1);

        for q in store.questions("lnx").await.unwrap() {
            let expected = if q.id == easy { 0.0 } else { 1.0 };
            assert_eq!(q.validity_score, Some(expected), "question {}", q.id);
        }
    }

    #[tokio::test]
    async fn too_few_attempts_writes_nothing() {
        let (store, _) = populate(9).await;
        let job = ValidityJob::new(Arc::clone(&store), 0.25);

        let run = job.score().await.unwrap();
        assert!(matches!(run, ValidityRun::Skipped { .. }));
        assert!(store
            .questions("lnx")
            .await
            .unwrap()
            .iter()
            .all(|q| q.validity_score.is_none()));
    }

    #[tokio::test]
    async fn attempts_on_replaced_exams_are_ignored() {
        let (store, _) = populate(10).await;
        let engine = GenerationEngine::new(Arc::clone(&store), ReuseScope::PerExam);
        engine.regenerate("lnx").await.unwrap();

        let job = ValidityJob::new(store, 0.25);
        assert!(job.collect_outcomes().await.unwrap().is_empty());
    }
}
