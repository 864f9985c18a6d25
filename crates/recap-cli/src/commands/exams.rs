//! The `recap exams` command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{open_store, OutputFormat};

pub async fn execute(course: String, format: OutputFormat, config_path: Option<PathBuf>) -> Result<()> {
    let (_, store) = open_store(config_path).await?;
    let record = store
        .course(&course)
        .await?
        .ok_or_else(|| anyhow::anyhow!("course '{course}' not found"))?;
    let exams = store.exams_for_course(&course).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&exams)?);
        return Ok(());
    }

    println!(
        "{} ({}), bank version {}, ingested {}",
        record.course.marketing_name,
        record.course.code,
        record.metadata.bank_version,
        record.ingested_at.format("%Y-%m-%d %H:%M UTC")
    );

    let mut table = Table::new();
    table.set_header(vec!["Exam", "Title", "Questions", "Minutes", "Pass %", "Domains"]);
    for exam in &exams {
        let mut per_domain: BTreeMap<&str, usize> = BTreeMap::new();
        for q in &exam.questions {
            *per_domain.entry(q.domain.as_str()).or_insert(0) += 1;
        }
        let domains = per_domain
            .iter()
            .map(|(d, n)| format!("{d}:{n}"))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            Cell::new(exam.id),
            Cell::new(&exam.title),
            Cell::new(exam.questions.len()),
            Cell::new(exam.exam_time_minutes),
            Cell::new(exam.passing_score),
            Cell::new(domains),
        ]);
    }
    println!("{table}");
    Ok(())
}
