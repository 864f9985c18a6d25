//! Fixed-interval job supervisor.
//!
//! Every job gets its own loop task driven by a tokio interval. Each run is
//! spawned separately, so a panicking job surfaces as a `JoinError` and the
//! loop keeps ticking. Operators talk to the scheduler over an mpsc channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{Job, JobSummary};

/// Commands accepted by a running scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run the named job now, outside its interval.
    RunNow(String),
    /// Stop every job loop after its current run.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopCommand {
    RunNow,
    Shutdown,
}

pub struct Scheduler {
    jobs: Vec<(Arc<dyn Job>, Duration)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Register a job to run every `period`, starting immediately.
    pub fn with_job(mut self, job: Arc<dyn Job>, period: Duration) -> Self {
        self.jobs.push((job, period));
        self
    }

    /// Start one loop per job plus the command dispatcher.
    pub fn spawn(self) -> SchedulerHandle {
        let (tx, mut rx) = mpsc::channel::<SchedulerCommand>(16);

        let mut loops: HashMap<String, mpsc::Sender<LoopCommand>> = HashMap::new();
        let mut tasks = Vec::with_capacity(self.jobs.len());
        for (job, period) in self.jobs {
            let (job_tx, job_rx) = mpsc::channel(4);
            tracing::info!(job = job.name(), period_secs = period.as_secs(), "job scheduled");
            loops.insert(job.name().to_string(), job_tx);
            tasks.push(tokio::spawn(job_loop(job, period, job_rx)));
        }

        let dispatcher = tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    SchedulerCommand::RunNow(name) => match loops.get(&name) {
                        Some(job_tx) => {
                            if job_tx.send(LoopCommand::RunNow).await.is_err() {
                                tracing::warn!(job = %name, "job loop has stopped");
                            }
                        }
                        None => tracing::warn!(job = %name, "unknown job"),
                    },
                    SchedulerCommand::Shutdown => break,
                }
            }

            for job_tx in loops.values() {
                let _ = job_tx.send(LoopCommand::Shutdown).await;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::error!(error = %e, "job loop ended abnormally");
                }
            }
            tracing::info!("scheduler stopped");
        });

        SchedulerHandle {
            commands: tx,
            dispatcher,
        }
    }
}

/// Control side of a running [`Scheduler`].
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    dispatcher: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn sender(&self) -> mpsc::Sender<SchedulerCommand> {
        self.commands.clone()
    }

    pub async fn run_now(&self, job: &str) -> Result<()> {
        self.commands
            .send(SchedulerCommand::RunNow(job.to_string()))
            .await
            .map_err(|_| anyhow::anyhow!("scheduler is not running"))
    }

    /// Stop all loops and wait for in-flight runs to finish.
    pub async fn shutdown(self) -> Result<()> {
        // The dispatcher may already be gone; waiting on it is what matters.
        let _ = self.commands.send(SchedulerCommand::Shutdown).await;
        self.dispatcher.await?;
        Ok(())
    }
}

async fn job_loop(job: Arc<dyn Job>, period: Duration, mut commands: mpsc::Receiver<LoopCommand>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_once(&job).await;
            }
            cmd = commands.recv() => match cmd {
                Some(LoopCommand::RunNow) => {
                    run_once(&job).await;
                }
                Some(LoopCommand::Shutdown) | None => break,
            },
        }
    }
    tracing::debug!(job = job.name(), "job loop stopped");
}

/// Run a job in its own task. Panics and errors are logged, never propagated.
pub async fn run_once(job: &Arc<dyn Job>) -> Option<JobSummary> {
    let name = job.name().to_string();
    let task_job = Arc::clone(job);
    match tokio::spawn(async move { task_job.run().await }).await {
        Ok(Ok(summary)) => {
            tracing::info!(
                job = %name,
                processed = summary.processed,
                skipped = summary.skipped,
                failed = summary.failed,
                "job run finished"
            );
            Some(summary)
        }
        Ok(Err(e)) => {
            tracing::error!(job = %name, error = %format!("{e:#}"), "job run failed");
            None
        }
        Err(e) => {
            tracing::error!(job = %name, error = %e, "job run panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        runs: AtomicUsize,
        panic: bool,
    }

    impl Counting {
        fn new(name: &'static str, panic: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                runs: AtomicUsize::new(0),
                panic,
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Job for Counting {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> Result<JobSummary> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("job blew up");
            }
            Ok(JobSummary::new(self.name))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_every_interval() {
        let job = Counting::new("count", false);
        let handle = Scheduler::new()
            .with_job(job.clone(), Duration::from_secs(60))
            .spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.runs(), 1);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(job.runs(), 3);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_job_keeps_its_loop_alive() {
        let job = Counting::new("boom", true);
        let handle = Scheduler::new()
            .with_job(job.clone(), Duration::from_secs(10))
            .spawn();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(job.runs(), 3);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn run_now_triggers_an_extra_run() {
        let job = Counting::new("count", false);
        let handle = Scheduler::new()
            .with_job(job.clone(), Duration::from_secs(3600))
            .spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.runs(), 1);

        handle.run_now("count").await.unwrap();
        handle.run_now("missing").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.runs(), 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn run_once_reports_failures_as_none() {
        let ok: Arc<dyn Job> = Counting::new("ok", false);
        let bad: Arc<dyn Job> = Counting::new("bad", true);
        assert_eq!(run_once(&ok).await, Some(JobSummary::new("ok")));
        assert_eq!(run_once(&bad).await, None);
    }
}
