//! The `recap validate` command.

use std::path::PathBuf;

use anyhow::Result;

use recap_core::error::BankError;
use recap_core::parser;

pub fn execute(bank_dir: PathBuf) -> Result<()> {
    let loaded = match parser::load_course_dir(&bank_dir) {
        Ok(loaded) => loaded,
        Err(e) => {
            if let Some(bank_err) = e.downcast_ref::<BankError>() {
                eprintln!("Course {}: {} issue(s)", bank_err.course, bank_err.issues.len());
                for issue in &bank_err.issues {
                    eprintln!("  ERROR: {issue}");
                }
            }
            return Err(e);
        }
    };

    let bank = &loaded.bank;
    println!(
        "Course: {} ({}), bank version {}, {} questions",
        bank.course.marketing_name,
        bank.course.code,
        bank.metadata.bank_version,
        bank.questions.len()
    );
    for w in &loaded.warnings {
        println!("  WARNING: {w}");
    }

    if loaded.warnings.is_empty() {
        println!("Exam bank valid.");
    } else {
        println!("\n{} warning(s) found.", loaded.warnings.len());
    }
    Ok(())
}
