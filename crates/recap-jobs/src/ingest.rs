//! Bank ingestion job.
//!
//! Each run scans the courses directory and ingests every course whose bank
//! files changed since the last committed revision. A bank rejected for its
//! content (validation or planning) is remembered by fingerprint and left
//! alone until its files change; any other failure is retried next run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{Mutex, Semaphore};

use recap_core::engine::{GenerationEngine, GenerationReport};
use recap_core::error::{BankError, GenerationError};
use recap_core::parser;
use recap_core::selector::ReuseScope;
use recap_core::traits::ExamStore;

use crate::{Job, JobSummary};

/// Courses ingested at the same time by default.
pub const DEFAULT_PARALLELISM: usize = 4;

/// What happened to one course directory.
#[derive(Debug)]
pub enum CourseOutcome {
    Ingested(GenerationReport),
    /// The committed bank already has this fingerprint.
    Unchanged,
    /// This exact revision was rejected before.
    PreviouslyRejected,
}

pub struct IngestionJob {
    courses_dir: PathBuf,
    store: Arc<dyn ExamStore>,
    engine: GenerationEngine,
    parallelism: usize,
    /// Course code to the fingerprint of its last rejected revision.
    rejected: Mutex<HashMap<String, String>>,
}

impl IngestionJob {
    pub fn new(courses_dir: impl Into<PathBuf>, store: Arc<dyn ExamStore>, scope: ReuseScope) -> Self {
        let engine = GenerationEngine::new(Arc::clone(&store), scope);
        Self {
            courses_dir: courses_dir.into(),
            store,
            engine,
            parallelism: DEFAULT_PARALLELISM,
            rejected: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn courses_dir(&self) -> &Path {
        &self.courses_dir
    }

    /// Ingest one course directory if its bank changed.
    pub async fn ingest_course(&self, dir: &Path) -> Result<CourseOutcome> {
        let code = course_code(dir)?;
        let fingerprint = parser::course_fingerprint(dir)?;

        if let Some(record) = self.store.course(&code).await? {
            if record.fingerprint == fingerprint {
                return Ok(CourseOutcome::Unchanged);
            }
        }
        if self.rejected.lock().await.get(&code) == Some(&fingerprint) {
            return Ok(CourseOutcome::PreviouslyRejected);
        }

        let result = match parser::load_course_dir(dir) {
            Ok(loaded) => self.engine.ingest(loaded.bank).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                self.rejected.lock().await.remove(&code);
                Ok(CourseOutcome::Ingested(report))
            }
            Err(e) => {
                if is_content_error(&e) {
                    tracing::warn!(
                        course = %code,
                        %fingerprint,
                        "bank rejected, will retry once its files change"
                    );
                    self.rejected.lock().await.insert(code, fingerprint);
                }
                Err(e)
            }
        }
    }
}

/// Failures that retrying the same files cannot fix.
pub fn is_content_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<BankError>().is_some() || err.downcast_ref::<GenerationError>().is_some()
}

fn course_code(dir: &Path) -> Result<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("course directory has no usable name: {}", dir.display()))
}

#[async_trait]
impl Job for IngestionJob {
    fn name(&self) -> &str {
        "ingestion"
    }

    async fn run(&self) -> Result<JobSummary> {
        let dirs = parser::discover_courses(&self.courses_dir)?;
        let mut summary = JobSummary::new(self.name());

        let semaphore = Semaphore::new(self.parallelism);
        let mut pending = FuturesUnordered::new();
        for dir in dirs {
            let semaphore = &semaphore;
            pending.push(async move {
                let _permit = semaphore.acquire().await;
                let outcome = self.ingest_course(&dir).await;
                (dir, outcome)
            });
        }

        while let Some((dir, outcome)) = pending.next().await {
            let label = dir.display().to_string();
            match outcome {
                Ok(CourseOutcome::Ingested(report)) => {
                    summary.processed += 1;
                    summary.notes.push(format!(
                        "{}: bank {} ingested, {} exam(s) of {} question(s)",
                        report.course_code,
                        report.bank_version,
                        report.exams.len(),
                        report.plan.questions_per_exam
                    ));
                }
                Ok(CourseOutcome::Unchanged) => {
                    tracing::debug!(course = %label, "bank unchanged");
                    summary.skipped += 1;
                }
                Ok(CourseOutcome::PreviouslyRejected) => {
                    tracing::debug!(course = %label, "bank still rejected");
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(course = %label, error = %format!("{e:#}"), "course ingestion failed");
                    summary.failed += 1;
                    summary.notes.push(format!("{label}: {e:#}"));
                }
            }
        }

        summary.notes.sort();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_store::MemoryStore;

    fn course_yaml(code: &str) -> String {
        format!("marketing_name: \"Linux Essentials\"\ncourse_code: \"{code}\"\nduration_days: 2\n")
    }

    fn question_row(domain: &str, text: &str) -> String {
        let mut cols = vec![
            "single".to_string(),
            domain.to_string(),
            text.to_string(),
            "see docs".to_string(),
            String::new(),
            String::new(),
            String::new(),
            "yes".to_string(),
            "TRUE".to_string(),
            String::new(),
            "no".to_string(),
            "FALSE".to_string(),
            String::new(),
        ];
        cols.resize(26, String::new());
        cols.join(",")
    }

    fn bank_csv(min: usize, max: usize, questions: usize) -> String {
        let mut lines = vec![
            "schema_version,1.2.0".to_string(),
            format!("min_questions,{min}"),
            format!("max_questions,{max}"),
            "exam_time,20".to_string(),
            "passing_score,70".to_string(),
            "domains,Shell:1.0".to_string(),
        ];
        for i in 0..questions {
            lines.push(question_row("Shell", &format!("Shell question {i}")));
        }
        lines.join("\n") + "\n"
    }

    fn write_course(root: &Path, code: &str, csv: &str) {
        let dir = root.join(code);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(parser::COURSE_FILE), course_yaml(code)).unwrap();
        std::fs::write(dir.join(parser::BANK_FILE), csv).unwrap();
    }

    fn job(root: &Path) -> (Arc<dyn ExamStore>, IngestionJob) {
        let store: Arc<dyn ExamStore> = Arc::new(MemoryStore::new());
        let job = IngestionJob::new(root, Arc::clone(&store), ReuseScope::PerExam);
        (store, job)
    }

    #[tokio::test]
    async fn ingests_new_banks_and_skips_unchanged_ones() {
        let root = tempfile::tempdir().unwrap();
        write_course(root.path(), "lnx-101", &bank_csv(3, 3, 6));
        let (store, job) = job(root.path());

        let first = job.run().await.unwrap();
        assert_eq!((first.processed, first.skipped, first.failed), (1, 0, 0));
        assert_eq!(store.exams_for_course("lnx-101").await.unwrap().len(), 2);

        let second = job.run().await.unwrap();
        assert_eq!((second.processed, second.skipped, second.failed), (0, 1, 0));
    }

    #[tokio::test]
    async fn ingests_many_courses_with_bounded_parallelism() {
        let root = tempfile::tempdir().unwrap();
        for code in ["lnx-101", "lnx-102", "lnx-103", "lnx-104", "lnx-105"] {
            write_course(root.path(), code, &bank_csv(3, 3, 6));
        }
        let (store, job) = job(root.path());
        let job = job.with_parallelism(2);

        let summary = job.run().await.unwrap();
        assert_eq!((summary.processed, summary.failed), (5, 0));
        assert!(summary.notes.windows(2).all(|w| w[0] <= w[1]));
        for code in ["lnx-101", "lnx-105"] {
            assert_eq!(store.exams_for_course(code).await.unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn changed_bank_is_reingested() {
        let root = tempfile::tempdir().unwrap();
        write_course(root.path(), "lnx-101", &bank_csv(3, 3, 6));
        let (store, job) = job(root.path());
        job.run().await.unwrap();

        write_course(root.path(), "lnx-101", &bank_csv(3, 3, 9));
        let summary = job.run().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(store.questions("lnx-101").await.unwrap().len(), 9);
        assert_eq!(store.exams_for_course("lnx-101").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn one_bad_course_does_not_block_the_others() {
        let root = tempfile::tempdir().unwrap();
        write_course(root.path(), "aaa-bad", "min_questions,oops\n");
        write_course(root.path(), "zzz-good", &bank_csv(3, 3, 6));
        let (store, job) = job(root.path());

        let summary = job.run().await.unwrap();
        assert_eq!((summary.processed, summary.failed), (1, 1));
        assert!(summary.notes.iter().any(|n| n.contains("aaa-bad")));
        assert!(store.course("aaa-bad").await.unwrap().is_none());
        assert!(store.course("zzz-good").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rejected_bank_waits_for_a_new_revision() {
        let root = tempfile::tempdir().unwrap();
        // Planning cannot fit 10 questions per exam out of 4.
        write_course(root.path(), "lnx-101", &bank_csv(10, 10, 4));
        let (store, job) = job(root.path());

        let err = job
            .ingest_course(&root.path().join("lnx-101"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<GenerationError>().is_some());
        assert!(is_content_error(&err));

        let again = job.run().await.unwrap();
        assert_eq!((again.skipped, again.failed), (1, 0));

        write_course(root.path(), "lnx-101", &bank_csv(2, 2, 4));
        let fixed = job.run().await.unwrap();
        assert_eq!(fixed.processed, 1);
        assert!(store.course("lnx-101").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn validation_failures_are_content_errors() {
        let root = tempfile::tempdir().unwrap();
        write_course(root.path(), "lnx-101", &bank_csv(3, 3, 0));
        let (_, job) = job(root.path());
        let err = job
            .ingest_course(&root.path().join("lnx-101"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<BankError>().is_some());
    }

    #[tokio::test]
    async fn missing_courses_dir_fails_the_run() {
        let root = tempfile::tempdir().unwrap();
        let (_, job) = job(&root.path().join("absent"));
        assert!(job.run().await.is_err());
    }
}
