//! Read-only reports: `courses`, `history` and `stats`.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};
use serde::Serialize;

use recap_core::model::CourseRecord;
use recap_core::stats::{self, QuestionStats};

use super::{open_store, OutputFormat};

#[derive(Serialize)]
struct CourseSummary {
    #[serde(flatten)]
    record: CourseRecord,
    exam_count: usize,
}

pub async fn courses(format: OutputFormat, config_path: Option<PathBuf>) -> Result<()> {
    let (_, store) = open_store(config_path).await?;
    let mut summaries = Vec::new();
    for record in store.courses().await? {
        let exam_count = store.exams_for_course(&record.course.code).await?.len();
        summaries.push(CourseSummary { record, exam_count });
    }
    summaries.sort_by(|a, b| {
        a.record
            .course
            .marketing_name
            .cmp(&b.record.course.marketing_name)
            .then_with(|| a.record.course.code.cmp(&b.record.course.code))
    });

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No courses ingested yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Code", "Course", "Days", "Bank", "Exams", "Ingested"]);
    for s in &summaries {
        let course = &s.record.course;
        table.add_row(vec![
            Cell::new(&course.code),
            Cell::new(&course.marketing_name),
            Cell::new(course.duration_days),
            Cell::new(&s.record.metadata.bank_version),
            Cell::new(s.exam_count),
            Cell::new(s.record.ingested_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn history(
    taker: String,
    format: OutputFormat,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, store) = open_store(config_path).await?;
    let entries = stats::taker_history(store.as_ref(), &taker).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No completed attempts for {taker}.");
        return Ok(());
    }

    println!("{} completed attempt(s) for {taker}:", entries.len());
    let mut table = Table::new();
    table.set_header(vec!["Attempt", "Exam", "Mode", "Score", "Result", "Completed"]);
    for e in &entries {
        let exam = e
            .exam_title
            .clone()
            .unwrap_or_else(|| format!("exam {} (replaced)", e.exam_id));
        let result = match e.pass {
            Some(true) => "pass",
            Some(false) => "fail",
            None => "-",
        };
        table.add_row(vec![
            Cell::new(e.attempt_id),
            Cell::new(exam),
            Cell::new(e.mode),
            Cell::new(format!("{}%", e.score_percent)),
            Cell::new(result),
            Cell::new(e.completed_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn stats(
    course: String,
    format: OutputFormat,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, store) = open_store(config_path).await?;
    let rows = stats::course_question_stats(store.as_ref(), &course).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Question", "Domain", "Type", "Attempted", "Correct", "Rate", "Validity", "Flagged",
    ]);
    for row in &rows {
        table.add_row(stats_row(row));
    }
    println!("{table}");
    Ok(())
}

fn stats_row(row: &QuestionStats) -> Vec<Cell> {
    vec![
        Cell::new(row.question_id),
        Cell::new(&row.domain),
        Cell::new(row.question_type),
        Cell::new(row.times_attempted),
        Cell::new(row.correct_count),
        Cell::new(
            row.correct_rate()
                .map(|r| format!("{:.0}%", r * 100.0))
                .unwrap_or_else(|| "-".into()),
        ),
        Cell::new(
            row.validity_score
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| "-".into()),
        ),
        Cell::new(if row.flagged { "yes" } else { "" }),
    ]
}
