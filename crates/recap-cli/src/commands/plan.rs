//! The `recap plan` command: a dry run of exam generation.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use recap_core::engine::generate_exams;
use recap_core::parser;
use recap_core::planner::{self, CandidateOutcome};
use recap_store::config::load_config_from;

pub fn execute(bank_dir: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let bank = parser::load_course_dir(&bank_dir)?.bank.with_sequential_ids();
    let meta = &bank.metadata;

    println!(
        "{} ({}), bank version {}: {} questions, {}..={} per exam",
        bank.course.marketing_name,
        bank.course.code,
        meta.bank_version,
        bank.questions.len(),
        meta.min_questions,
        meta.max_questions
    );

    let counts = planner::domain_counts(&bank.questions);
    let mut table = Table::new();
    table.set_header(vec!["Size", "Outcome", "Per exam", "Exams", "Unused"]);
    for candidate in planner::evaluate_candidates(
        &counts,
        bank.questions.len(),
        meta.min_questions,
        meta.max_questions,
        &meta.domains,
        config.reuse_scope,
    ) {
        let row = match &candidate.outcome {
            CandidateOutcome::Feasible {
                questions_per_exam,
                num_exams,
                remainder,
                ..
            } => vec![
                Cell::new(candidate.target_size),
                Cell::new("feasible"),
                Cell::new(questions_per_exam),
                Cell::new(num_exams),
                Cell::new(remainder),
            ],
            CandidateOutcome::ShortDomain {
                domain,
                available,
                required,
            } => vec![
                Cell::new(candidate.target_size),
                Cell::new(format!("'{domain}' short: {available}/{required}")),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
            ],
            CandidateOutcome::Empty => vec![
                Cell::new(candidate.target_size),
                Cell::new("empty"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
            ],
        };
        table.add_row(row);
    }
    println!("{table}");

    let generated = generate_exams(&bank.course, meta, &bank.questions, config.reuse_scope)?;
    let plan = &generated.plan;
    println!(
        "\nPlan: {} exam(s) of {} question(s), {} unused ({} reuse)",
        plan.num_exams, plan.questions_per_exam, plan.unused_questions, config.reuse_scope
    );

    let mut exams = Table::new();
    let mut header = vec!["#".to_string(), "Title".to_string(), "Seed".to_string()];
    header.extend(plan.per_domain_quota.keys().cloned());
    exams.set_header(header);
    for draft in &generated.drafts {
        let per_domain = draft.domain_counts();
        let mut row = vec![
            Cell::new(draft.index + 1),
            Cell::new(&draft.title),
            Cell::new(format!("{:016x}", draft.seed)),
        ];
        row.extend(
            plan.per_domain_quota
                .keys()
                .map(|d| Cell::new(per_domain.get(d.as_str()).copied().unwrap_or(0))),
        );
        exams.add_row(row);
    }
    println!("{exams}");
    Ok(())
}
