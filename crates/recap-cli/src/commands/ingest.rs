//! The `recap ingest` and `recap regenerate` commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use recap_core::engine::{GenerationEngine, GenerationReport};
use recap_jobs::ingest::CourseOutcome;
use recap_jobs::{IngestionJob, Job};

use super::open_store;

pub async fn execute(bank_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let (config, store) = open_store(config_path).await?;
    let job = IngestionJob::new(&config.courses_dir, Arc::clone(&store), config.reuse_scope);

    match bank_dir {
        Some(dir) => match job.ingest_course(&dir).await? {
            CourseOutcome::Ingested(report) => print_report(&report),
            CourseOutcome::Unchanged => println!("{}: bank unchanged, nothing to do.", dir.display()),
            CourseOutcome::PreviouslyRejected => {
                println!("{}: bank was rejected before and has not changed.", dir.display())
            }
        },
        None => {
            let summary = job.run().await?;
            for note in &summary.notes {
                println!("  {note}");
            }
            println!("{summary}");
            if summary.failed > 0 {
                anyhow::bail!("{} course(s) failed to ingest", summary.failed);
            }
        }
    }
    Ok(())
}

pub async fn regenerate(course: String, config_path: Option<PathBuf>) -> Result<()> {
    let (config, store) = open_store(config_path).await?;
    let engine = GenerationEngine::new(store, config.reuse_scope);
    let report = engine.regenerate(&course).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &GenerationReport) {
    println!(
        "Course {} bank {}: {} question(s), {} exam(s) of {} question(s), {} unused",
        report.course_code,
        report.bank_version,
        report.question_count,
        report.exams.len(),
        report.plan.questions_per_exam,
        report.plan.unused_questions
    );
    for exam in &report.exams {
        println!("  [{}] {}", exam.id, exam.title);
    }
}
