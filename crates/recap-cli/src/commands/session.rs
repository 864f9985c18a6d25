//! Exam-taking commands: `start`, `answer`, `status` and `submit`.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use comfy_table::{Cell, Table};

use recap_core::grading::{AnswerFeedback, ExamSubmissionResult};
use recap_core::model::{Answer, AttemptId, AttemptMode, ChoiceId, ExamId, ExamQuestionId};
use recap_core::session::{ExamSessions, RecordOutcome, StartedSession};

use super::{open_store, OutputFormat};

async fn sessions(config_path: Option<PathBuf>) -> Result<ExamSessions> {
    let (_, store) = open_store(config_path).await?;
    Ok(ExamSessions::new(store))
}

pub async fn start(
    exam: ExamId,
    taker: String,
    mode: AttemptMode,
    format: OutputFormat,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let started = sessions(config_path)
        .await?
        .start(exam, &taker, mode, Utc::now())
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&started)?),
        OutputFormat::Text => print_started(&started),
    }
    Ok(())
}

fn print_started(started: &StartedSession) {
    println!(
        "Attempt {} started: {} ({} mode, {} minutes, {} questions)",
        started.attempt.id,
        started.exam_title,
        started.attempt.mode,
        started.time_limit_minutes,
        started.questions.len()
    );
    for q in &started.questions {
        println!(
            "\n{}. [question {}] ({}, {}) {}",
            q.order, q.exam_question_id, q.domain, q.question_type, q.text
        );
        if let Some(code) = &q.code_block {
            println!("    {}", code.replace('\n', "\n    "));
        }
        if let Some(url) = &q.image_url {
            println!("    image: {url}");
        }
        for c in &q.choices {
            println!("    {}) {} [choice {}]", c.label, c.text, c.id);
        }
    }
}

pub async fn answer(
    attempt: AttemptId,
    taker: String,
    question: ExamQuestionId,
    choices: Vec<ChoiceId>,
    text: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let answer = Answer {
        choice_ids: choices,
        text,
    };
    let outcome = sessions(config_path)
        .await?
        .record_answer(attempt, &taker, question, answer)
        .await?;

    match outcome {
        RecordOutcome::Saved => println!("Answer saved."),
        RecordOutcome::Feedback(feedback) => print_feedback(&feedback),
    }
    Ok(())
}

fn print_feedback(feedback: &AnswerFeedback) {
    println!("{}", if feedback.correct { "Correct!" } else { "Incorrect." });
    if !feedback.explanation.is_empty() {
        println!("{}", feedback.explanation);
    }
    if let Some(hint) = &feedback.hint {
        println!("Hint: {hint}");
    }
    for c in &feedback.choice_feedback {
        let marker = match (c.selected, c.is_correct) {
            (true, true) => "+",
            (true, false) => "x",
            (false, true) => "!",
            (false, false) => " ",
        };
        let note = if c.explanation.is_empty() {
            String::new()
        } else {
            format!(" - {}", c.explanation)
        };
        println!("  [{marker}] {}{note}", c.label);
    }
}

pub async fn status(attempt: AttemptId, taker: String, config_path: Option<PathBuf>) -> Result<()> {
    let status = sessions(config_path)
        .await?
        .status(attempt, &taker, Utc::now())
        .await?;
    println!(
        "Attempt {attempt}: {}, {} answered, {} remaining, time left {}",
        if status.completed { "completed" } else { "in progress" },
        status.answered_count,
        status.remaining_count,
        status.time_remaining
    );
    Ok(())
}

pub async fn submit(
    attempt: AttemptId,
    taker: String,
    format: OutputFormat,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let result = sessions(config_path)
        .await?
        .submit(attempt, &taker, Utc::now())
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_result(&result),
    }
    Ok(())
}

fn print_result(result: &ExamSubmissionResult) {
    println!(
        "Score: {}% ({} of {} correct), passing score {}%: {}",
        result.score_percent,
        result.correct_count,
        result.total_questions,
        result.passing_score,
        if result.pass { "PASSED" } else { "FAILED" }
    );

    let mut domains = Table::new();
    domains.set_header(vec!["Domain", "Score"]);
    for (domain, score) in &result.domain_breakdown {
        domains.add_row(vec![Cell::new(domain), Cell::new(format!("{score}%"))]);
    }
    println!("\n{domains}");

    let mut details = Table::new();
    details.set_header(vec!["#", "Domain", "Result", "Your answer", "Correct answer"]);
    for (i, item) in result.detailed_report.iter().enumerate() {
        details.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&item.domain),
            Cell::new(item.result),
            Cell::new(item.your_answer.join(", ")),
            Cell::new(item.correct_answer.join(", ")),
        ]);
    }
    println!("\n{details}");
}
