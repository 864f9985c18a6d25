//! recap-jobs: periodic background work.
//!
//! Scans course directories for new or changed exam banks, recomputes
//! question validity scores, and runs both on fixed intervals.

pub mod ingest;
pub mod scheduler;
pub mod validity;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ingest::IngestionJob;
pub use scheduler::{Scheduler, SchedulerCommand, SchedulerHandle};
pub use validity::ValidityJob;

/// A unit of background work that can be run repeatedly.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable name used in logs and `RunNow` commands.
    fn name(&self) -> &str;

    async fn run(&self) -> Result<JobSummary>;
}

/// What one run of a job did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job: String,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// One line per item worth reporting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl JobSummary {
    pub fn new(job: &str) -> Self {
        Self {
            job: job.to_string(),
            ..Self::default()
        }
    }
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} processed, {} skipped, {} failed",
            self.job, self.processed, self.skipped, self.failed
        )
    }
}
