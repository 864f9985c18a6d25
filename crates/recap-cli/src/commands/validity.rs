//! The `recap validity` and `recap flag` commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use comfy_table::{Cell, Table};

use recap_core::model::QuestionId;
use recap_core::session::ExamSessions;
use recap_core::validity::ValidityRun;
use recap_jobs::ValidityJob;

use super::open_store;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let (config, store) = open_store(config_path).await?;
    let job = ValidityJob::new(Arc::clone(&store), config.validity_threshold);

    match job.score().await? {
        ValidityRun::Skipped { reason } => println!("Validity scoring skipped: {reason}"),
        ValidityRun::Computed {
            low_group,
            high_group,
            scores,
        } => {
            println!(
                "Scored {} question(s) from {} low and {} high scoring attempt(s):",
                scores.len(),
                low_group,
                high_group
            );
            let mut table = Table::new();
            table.set_header(vec!["Question", "Domain", "Score", "Review"]);
            for (qid, score) in &scores {
                let domain = store
                    .question(*qid)
                    .await?
                    .map(|q| q.domain)
                    .unwrap_or_default();
                table.add_row(vec![
                    Cell::new(qid),
                    Cell::new(domain),
                    Cell::new(format!("{score:.2}")),
                    Cell::new(if *score <= 0.0 { "yes" } else { "" }),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

pub async fn flag(question: QuestionId, flagged: bool, config_path: Option<PathBuf>) -> Result<()> {
    let (_, store) = open_store(config_path).await?;
    ExamSessions::new(store).set_flagged(question, flagged).await?;
    if flagged {
        println!("Question {question} flagged for review.");
    } else {
        println!("Question {question} review flag cleared.");
    }
    Ok(())
}
