//! Fixed-delay scheduling of synchronizers on a bounded executor.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::synchronizer::{SyncKind, SyncReport, Synchronizer};
use gatesync_protocol::{now_millis, SyncWindow};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A unit of work the scheduler runs periodically.
pub trait SyncJob: Send + Sync {
    /// Short name used in logs and checkpoints.
    fn name(&self) -> &'static str;

    /// Processes the events of `[from, to)`. Blocking.
    fn synchronize(&self, from: i64, to: i64, environments: &BTreeSet<String>) -> SyncResult<SyncReport>;
}

impl<K: SyncKind> SyncJob for Synchronizer<K> {
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn synchronize(&self, from: i64, to: i64, environments: &BTreeSet<String>) -> SyncResult<SyncReport> {
        Synchronizer::synchronize(self, from, to, environments)
    }
}

/// Runs blocking jobs on tokio's blocking pool, at most `pool_size` at once.
#[derive(Debug)]
pub struct SyncExecutor {
    permits: Arc<Semaphore>,
    pool_size: usize,
}

impl SyncExecutor {
    /// Creates an executor. A size of zero is raised to one.
    pub fn new(pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(pool_size)),
            pool_size,
        }
    }

    /// Returns the number of concurrent runs allowed.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Runs a job once and waits for its result.
    pub async fn execute(
        &self,
        job: Arc<dyn SyncJob>,
        from: i64,
        to: i64,
        environments: Arc<BTreeSet<String>>,
    ) -> SyncResult<SyncReport> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SyncError::Cancelled)?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job.synchronize(from, to, &environments)
        })
        .await
        .map_err(|e| SyncError::Executor(format!("sync job panicked: {e}")))?
    }

    /// Refuses new runs. Runs already started complete.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Returns true once [`SyncExecutor::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

struct ScheduledJob {
    job: Arc<dyn SyncJob>,
    // Upper bound of the last successful run, or -1 before the first one.
    checkpoint: AtomicI64,
}

impl ScheduledJob {
    async fn run_once(
        &self,
        executor: &SyncExecutor,
        environments: Arc<BTreeSet<String>>,
    ) -> SyncResult<SyncReport> {
        let from = self.checkpoint.load(Ordering::SeqCst);
        let to = now_millis();
        let result = executor
            .execute(self.job.clone(), from, to, environments)
            .await;
        match &result {
            Ok(_) => self.checkpoint.store(to, Ordering::SeqCst),
            Err(e) => warn!(
                job = self.job.name(),
                from,
                error = %e,
                "sync run failed, window will be retried"
            ),
        }
        result
    }
}

/// Invokes every registered job on a fixed delay until shut down.
pub struct SyncScheduler {
    delay: Duration,
    environments: Arc<BTreeSet<String>>,
    executor: Arc<SyncExecutor>,
    jobs: Vec<Arc<ScheduledJob>>,
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Creates a scheduler with its own executor.
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_executor(config, Arc::new(SyncExecutor::new(config.pool_size)))
    }

    /// Creates a scheduler sharing an executor.
    pub fn with_executor(config: &SyncConfig, executor: Arc<SyncExecutor>) -> Self {
        Self {
            delay: config.delay,
            environments: Arc::new(config.environments.clone()),
            executor,
            jobs: Vec::new(),
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Adds a job. Jobs run in registration order during the initial pass.
    pub fn register(&mut self, job: Arc<dyn SyncJob>) {
        self.jobs.push(Arc::new(ScheduledJob {
            job,
            checkpoint: AtomicI64::new(SyncWindow::INITIAL),
        }));
    }

    /// Returns the checkpoint of a job.
    pub fn checkpoint(&self, name: &str) -> Option<i64> {
        self.jobs
            .iter()
            .find(|j| j.job.name() == name)
            .map(|j| j.checkpoint.load(Ordering::SeqCst))
    }

    /// Returns true while the loops are running.
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() && !self.token.is_cancelled()
    }

    /// Runs every job once, in registration order, and stops at the first failure.
    pub async fn synchronize_all_once(&self) -> SyncResult<Vec<(&'static str, SyncReport)>> {
        let mut reports = Vec::with_capacity(self.jobs.len());
        for scheduled in &self.jobs {
            let report = scheduled
                .run_once(&self.executor, self.environments.clone())
                .await?;
            reports.push((scheduled.job.name(), report));
        }
        Ok(reports)
    }

    /// Spawns one fixed-delay loop per job. Must be called within a tokio runtime.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            return;
        }
        for scheduled in &self.jobs {
            let scheduled = scheduled.clone();
            let executor = self.executor.clone();
            let environments = self.environments.clone();
            let token = self.token.clone();
            let delay = self.delay;

            self.handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(delay);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            // Errors are logged by run_once; the loop keeps going.
                            let _ = scheduled.run_once(&executor, environments.clone()).await;
                        }
                    }
                }
                debug!(job = scheduled.job.name(), "sync loop stopped");
            }));
        }
        info!(
            jobs = self.jobs.len(),
            delay_ms = self.delay.as_millis() as u64,
            pool_size = self.executor.pool_size(),
            "sync scheduler started"
        );
    }

    /// Stops the loops, waits for in-flight runs and closes the executor.
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "sync loop ended abnormally");
            }
        }
        self.executor.close();
        info!("sync scheduler stopped");
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
