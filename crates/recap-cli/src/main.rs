//! recap CLI: the operator and test-taker command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use recap_core::model::{AttemptId, AttemptMode, ExamId, ExamQuestionId, QuestionId};

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(
    name = "recap",
    version,
    about = "Exam bank ingestion, deterministic exam generation and practice sessions"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and a sample course
    Init,

    /// Validate a course directory without storing anything
    Validate {
        /// Course directory containing course.yaml and exam_bank.csv
        #[arg(long)]
        bank: PathBuf,
    },

    /// Show how a bank would be split into exams
    Plan {
        /// Course directory containing course.yaml and exam_bank.csv
        #[arg(long)]
        bank: PathBuf,
    },

    /// Ingest one course directory, or every changed course when omitted
    Ingest {
        /// Course directory containing course.yaml and exam_bank.csv
        #[arg(long)]
        bank: Option<PathBuf>,
    },

    /// Rebuild a course's exams from its stored questions
    Regenerate {
        #[arg(long)]
        course: String,
    },

    /// List the generated exams of a course
    Exams {
        #[arg(long)]
        course: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Start an exam session
    Start {
        #[arg(long)]
        exam: ExamId,

        /// Test-taker email
        #[arg(long)]
        taker: String,

        /// practice or simulation
        #[arg(long, default_value = "practice")]
        mode: AttemptMode,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Answer one question of a session
    Answer {
        #[arg(long)]
        attempt: AttemptId,

        #[arg(long)]
        taker: String,

        /// Exam question id, as printed by `start`
        #[arg(long)]
        question: ExamQuestionId,

        /// Selected choice ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        choices: Vec<u32>,

        /// Free-text answer for fill-in-the-blank questions
        #[arg(long)]
        text: Option<String>,
    },

    /// Show progress and remaining time of a session
    Status {
        #[arg(long)]
        attempt: AttemptId,

        #[arg(long)]
        taker: String,
    },

    /// Submit a session for grading
    Submit {
        #[arg(long)]
        attempt: AttemptId,

        #[arg(long)]
        taker: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Recompute question validity scores from completed attempts
    Validity,

    /// Flag a question for manual review
    Flag {
        #[arg(long)]
        question: QuestionId,

        /// Remove the flag instead
        #[arg(long)]
        clear: bool,
    },

    /// List ingested courses
    Courses {
        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// List a test-taker's completed attempts, newest first
    History {
        /// Test-taker email
        #[arg(long)]
        taker: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show attempts, correct answers, validity and flags per question
    Stats {
        #[arg(long)]
        course: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Run ingestion and validity scoring on their configured intervals
    Serve,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("recap=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Plan { bank } => commands::plan::execute(bank, config),
        Commands::Ingest { bank } => commands::ingest::execute(bank, config).await,
        Commands::Regenerate { course } => commands::ingest::regenerate(course, config).await,
        Commands::Exams { course, format } => commands::exams::execute(course, format, config).await,
        Commands::Start {
            exam,
            taker,
            mode,
            format,
        } => commands::session::start(exam, taker, mode, format, config).await,
        Commands::Answer {
            attempt,
            taker,
            question,
            choices,
            text,
        } => commands::session::answer(attempt, taker, question, choices, text, config).await,
        Commands::Status { attempt, taker } => {
            commands::session::status(attempt, taker, config).await
        }
        Commands::Submit {
            attempt,
            taker,
            format,
        } => commands::session::submit(attempt, taker, format, config).await,
        Commands::Validity => commands::validity::execute(config).await,
        Commands::Flag { question, clear } => {
            commands::validity::flag(question, !clear, config).await
        }
        Commands::Courses { format } => commands::reports::courses(format, config).await,
        Commands::History { taker, format } => {
            commands::reports::history(taker, format, config).await
        }
        Commands::Stats { course, format } => {
            commands::reports::stats(course, format, config).await
        }
        Commands::Serve => commands::serve::execute(config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
