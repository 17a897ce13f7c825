// caseforge-worker/src/framework.rs
// ============================================================================
// Module: Worker Framework
// Description: The dequeue/process/ack loop, heartbeat companion, and
//              zombie-recovery sweep shared by every pipeline.
// Purpose: Define Worker, WorkerError, WorkerContext, RetryPolicy, and the
//          Framework that registers workers and drives their task loops.
// Dependencies: async-trait, caseforge-core, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! One `tokio::task` per registered topic runs the dequeue/process/ack
//! loop; one companion task per in-flight `process` call sends heartbeats;
//! one task sweeps for zombie jobs. Shutdown is a `tokio::sync::Notify`
//! every task selects against alongside its normal wait, matching the
//! "one shutdown channel broadcasts termination" design note.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use caseforge_core::interfaces::queue::LeasedMessage;
use caseforge_core::interfaces::store::RetryBudget;
use caseforge_core::JobMessage;
use caseforge_core::JobStatus;
use caseforge_core::JobType;
use caseforge_core::PersistenceStore;
use caseforge_core::Queue;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::registry;
use crate::telemetry::JobEvent;
use crate::telemetry::JobOutcome;
use crate::telemetry::TelemetrySink;

/// Default per-topic dequeue lease duration.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(60);
/// Default per-topic dequeue long-poll wait.
pub const DEFAULT_DEQUEUE_WAIT: Duration = Duration::from_secs(5);
/// Default heartbeat interval while a job is running.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Default staleness threshold before a running job is considered a zombie.
pub const DEFAULT_ZOMBIE_TIMEOUT: Duration = Duration::from_secs(120);

/// The two error classes exposed to [`Worker::process`]; anything a
/// pipeline cannot classify more specifically defaults to `Retryable`.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The framework should retry per [`RetryPolicy`]'s backoff.
    #[error("retryable: {0}")]
    Retryable(String),
    /// The framework should dead-letter the job immediately.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl WorkerError {
    /// The message carried by either variant, for recording on the job row.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(message) | Self::Fatal(message) => message,
        }
    }
}

impl From<caseforge_core::StoreError> for WorkerError {
    fn from(error: caseforge_core::StoreError) -> Self {
        Self::Retryable(error.to_string())
    }
}

impl From<caseforge_core::QueueError> for WorkerError {
    fn from(error: caseforge_core::QueueError) -> Self {
        Self::Retryable(error.to_string())
    }
}

impl From<caseforge_core::ClientError> for WorkerError {
    fn from(error: caseforge_core::ClientError) -> Self {
        use caseforge_core::ErrorClass;
        match error.default_class() {
            ErrorClass::Fatal => Self::Fatal(error.to_string()),
            ErrorClass::Retryable => Self::Retryable(error.to_string()),
        }
    }
}

/// Shared dependencies passed to every [`Worker::process`] call.
#[derive(Clone)]
pub struct WorkerContext {
    /// The durable store backing every aggregate.
    pub store: Arc<dyn PersistenceStore>,
    /// The job queue, for enqueuing follow-up jobs (e.g. profile -> imagegen).
    pub queue: Arc<dyn Queue>,
}

/// A single registered job-type handler.
///
/// # Errors
/// [`Worker::process`] returns [`WorkerError::Retryable`] for anything the
/// framework should retry per [`RetryPolicy`], and [`WorkerError::Fatal`]
/// for anything it should dead-letter immediately.
#[async_trait]
pub trait Worker: Send + Sync {
    /// The job type (and queue topic) this worker handles.
    fn job_type(&self) -> JobType;
    /// Processes a single dequeued message to completion.
    async fn process(&self, ctx: &WorkerContext, message: &JobMessage) -> Result<(), WorkerError>;
}

/// Exponential backoff configuration for retryable failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum delivery attempts before a job is marked terminally failed.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub initial_interval: Duration,
    /// Backoff ceiling.
    pub max_interval: Duration,
    /// Multiplier applied per additional attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Computes the backoff for 1-indexed attempt `n` (`n = 1` is the delay
    /// before the first redelivery): `min(initial * multiplier^(n-1), max)`.
    #[must_use]
    pub fn backoff_for(&self, n: u32) -> Duration {
        let scaled = self.initial_interval.as_secs_f64() * self.multiplier.powi((n.max(1) - 1) as i32);
        Duration::from_secs_f64(scaled.min(self.max_interval.as_secs_f64()))
    }
}

/// The job-processing framework: registers workers and drives their task
/// loops, a heartbeat companion per in-flight job, and the zombie sweeper.
pub struct Framework {
    store: Arc<dyn PersistenceStore>,
    queue: Arc<dyn Queue>,
    workers: Vec<Arc<dyn Worker>>,
    retry_policy: RetryPolicy,
    heartbeat_interval: Duration,
    visibility_timeout: Duration,
    dequeue_wait: Duration,
    zombie_timeout: Duration,
    telemetry: Arc<dyn TelemetrySink>,
    shutdown: Arc<tokio::sync::Notify>,
}

/// A handle to a started [`Framework`]; `stop` signals shutdown and waits
/// for every task to return.
pub struct FrameworkHandle {
    shutdown: Arc<tokio::sync::Notify>,
    handles: Vec<JoinHandle<()>>,
}

impl FrameworkHandle {
    /// Signals every task to stop, then waits (bounded only by the tasks'
    /// own cooperative cancellation checks) for them to return.
    pub async fn stop(self) {
        self.shutdown.notify_waiters();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

impl Framework {
    /// Creates a framework with default timeouts and retry policy.
    #[must_use]
    pub fn new(store: Arc<dyn PersistenceStore>, queue: Arc<dyn Queue>) -> Self {
        Self {
            store,
            queue,
            workers: Vec::new(),
            retry_policy: RetryPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            dequeue_wait: DEFAULT_DEQUEUE_WAIT,
            zombie_timeout: DEFAULT_ZOMBIE_TIMEOUT,
            telemetry: Arc::new(crate::telemetry::NoopTelemetry),
            shutdown: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Overrides the zombie-staleness timeout (the sweep interval is
    /// derived as half of it, per the design note).
    #[must_use]
    pub fn with_zombie_timeout(mut self, zombie_timeout: Duration) -> Self {
        self.zombie_timeout = zombie_timeout;
        self
    }

    /// Overrides the telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Registers a worker. Also records its job type in the process-wide
    /// worker-type registry so HTTP handlers can reject unsupported job
    /// types early.
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        registry::register(worker.job_type());
        self.workers.push(worker);
    }

    /// Starts one task per registered worker plus the zombie sweeper.
    #[must_use]
    pub fn start(self: Arc<Self>) -> FrameworkHandle {
        let mut handles = Vec::with_capacity(self.workers.len() + 1);
        for worker in self.workers.clone() {
            let framework = Arc::clone(&self);
            handles.push(tokio::spawn(async move { framework.run_topic_loop(worker).await }));
        }
        {
            let framework = Arc::clone(&self);
            handles.push(tokio::spawn(async move { framework.run_zombie_sweeper().await }));
        }
        FrameworkHandle { shutdown: Arc::clone(&self.shutdown), handles }
    }

    async fn run_topic_loop(self: Arc<Self>, worker: Arc<dyn Worker>) {
        let topic = worker.job_type().topic();
        loop {
            tokio::select! {
                () = self.shutdown.notified() => {
                    tracing::info!(topic, "worker loop shutting down");
                    break;
                }
                dequeued = self.queue.dequeue(topic, self.visibility_timeout, self.dequeue_wait) => {
                    match dequeued {
                        Ok(Some(leased)) => self.handle_message(Arc::clone(&worker), leased).await,
                        Ok(None) => {}
                        Err(error) => {
                            tracing::warn!(topic, %error, "dequeue failed");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_message(&self, worker: Arc<dyn Worker>, leased: LeasedMessage) {
        let job_id = leased.message.job_id.clone();
        let topic = leased.topic.clone();
        let attempt = leased.message.attempts;
        let span = tracing::info_span!("process_job", job_id = %job_id, topic, attempt);
        let _entered = span.enter();

        self.telemetry.record(JobEvent::Dequeued { job_id: job_id.clone(), topic: topic.clone(), attempt });
        if let Err(error) = self.store.update_job_status(&job_id, JobStatus::Running).await {
            tracing::error!(job_id = %job_id, %error, "failed to mark job running");
        }

        let heartbeat_shutdown = self.shutdown.clone();
        let heartbeat_store = Arc::clone(&self.store);
        let heartbeat_job_id = job_id.clone();
        let heartbeat_interval = self.heartbeat_interval;
        let heartbeat_telemetry = Arc::clone(&self.telemetry);
        let heartbeat_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = heartbeat_shutdown.notified() => break,
                    _ = ticker.tick() => {
                        if heartbeat_store.update_job_heartbeat(&heartbeat_job_id).await.is_ok() {
                            heartbeat_telemetry.record(JobEvent::HeartbeatSent { job_id: heartbeat_job_id.clone() });
                        }
                    }
                }
            }
        });

        let ctx = WorkerContext { store: Arc::clone(&self.store), queue: Arc::clone(&self.queue) };
        let result = worker.process(&ctx, &leased.message).await;
        heartbeat_handle.abort();

        match result {
            Ok(()) => {
                tracing::info!(job_id = %job_id, "job completed");
                self.telemetry.record(JobEvent::Completed { job_id: job_id.clone(), outcome: JobOutcome::Done });
                if let Err(error) = self.queue.ack(&leased).await {
                    tracing::warn!(job_id = %job_id, %error, "ack failed");
                }
            }
            Err(WorkerError::Fatal(message)) => {
                tracing::warn!(job_id = %job_id, message, "job failed fatally");
                if let Err(error) = self.store.update_job_error(&job_id, message.clone()).await {
                    tracing::error!(job_id = %job_id, %error, "failed to record fatal error");
                }
                self.telemetry
                    .record(JobEvent::Completed { job_id: job_id.clone(), outcome: JobOutcome::Failed { reason: message } });
                let _ = self.queue.nack(leased, 0).await;
            }
            Err(WorkerError::Retryable(message)) => {
                match self.store.increment_job_retry(&job_id, self.retry_policy.max_attempts).await {
                    Ok(RetryBudget::WithinBudget) => {
                        tracing::info!(job_id = %job_id, attempt, "job failed, scheduling retry");
                        if let Err(error) = self.store.update_job_status(&job_id, JobStatus::Queued).await {
                            tracing::error!(job_id = %job_id, %error, "failed to requeue job");
                        }
                        self.telemetry.record(JobEvent::Completed {
                            job_id: job_id.clone(),
                            outcome: JobOutcome::RetryScheduled { attempt },
                        });
                        tokio::time::sleep(self.retry_policy.backoff_for(attempt)).await;
                        let _ = self.queue.nack(leased, self.retry_policy.max_attempts).await;
                    }
                    Ok(RetryBudget::Exhausted) => {
                        tracing::warn!(job_id = %job_id, "retry budget exhausted");
                        if let Err(error) = self.store.update_job_error(&job_id, message.clone()).await {
                            tracing::error!(job_id = %job_id, %error, "failed to record exhausted error");
                        }
                        self.telemetry.record(JobEvent::Completed {
                            job_id: job_id.clone(),
                            outcome: JobOutcome::Failed { reason: message },
                        });
                        let _ = self.queue.nack(leased, self.retry_policy.max_attempts).await;
                    }
                    Err(error) => tracing::error!(job_id = %job_id, %error, "failed to increment retry count"),
                }
            }
        }
    }

    async fn run_zombie_sweeper(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.zombie_timeout / 2);
        loop {
            tokio::select! {
                () = self.shutdown.notified() => {
                    tracing::info!("zombie sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => self.sweep_once().await,
            }
        }
    }

    async fn sweep_once(&self) {
        for worker in &self.workers {
            let topic = worker.job_type().topic();
            match self.queue.recover_stale_jobs(topic).await {
                Ok(count) if count > 0 => tracing::info!(topic, count, "recovered stale leases"),
                Ok(_) => {}
                Err(error) => tracing::warn!(topic, %error, "recover_stale_jobs failed"),
            }
        }

        let zombies = match self.store.get_zombie_jobs(self.zombie_timeout).await {
            Ok(zombies) => zombies,
            Err(error) => {
                tracing::warn!(%error, "get_zombie_jobs failed");
                return;
            }
        };
        for job in zombies {
            match self.store.increment_job_retry(&job.id, self.retry_policy.max_attempts).await {
                Ok(RetryBudget::WithinBudget) => {
                    tracing::info!(job_id = %job.id, "zombie job recovered to queued");
                    if let Err(error) = self.store.update_job_status(&job.id, JobStatus::Queued).await {
                        tracing::error!(job_id = %job.id, %error, "failed to requeue zombie job");
                        continue;
                    }
                    let message = JobMessage {
                        job_id: job.id.clone(),
                        case_id: job.case_id.clone(),
                        job_type: job.job_type,
                        input: job.input.clone(),
                        attempts: job.retry_count + 1,
                    };
                    if let Err(error) = self.queue.enqueue(message).await {
                        tracing::error!(job_id = %job.id, %error, "failed to re-enqueue zombie job");
                    }
                    self.telemetry.record(JobEvent::Completed {
                        job_id: job.id.clone(),
                        outcome: JobOutcome::ZombieRecovered,
                    });
                }
                Ok(RetryBudget::Exhausted) => {
                    tracing::warn!(job_id = %job.id, "zombie job exceeded retry budget");
                    let _ = self
                        .store
                        .update_job_error(&job.id, "zombie-exceeded-retries".to_string())
                        .await;
                }
                Err(error) => tracing::error!(job_id = %job.id, %error, "failed to increment zombie retry"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_clamps_to_max() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_for(10), Duration::from_secs(30));
    }
}
