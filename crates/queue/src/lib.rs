//! In-process job queue driving the Greenlight execution engine
//!
//! A single logical consumer drains a FIFO of jobs; handlers run to
//! completion before the next job starts. Failed jobs are re-appended
//! to the tail after an exponential backoff until their attempts are
//! exhausted, then dropped (fire-and-forget; visible only in logs).
//!
//! Jobs live only in memory. A process crash loses in-flight jobs,
//! which can stall an execution at a non-approval step; persistence is
//! a host concern, not the queue's.

mod job;

pub use job::{Job, JobError};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};

type HandlerFuture = futures::future::BoxFuture<'static, Result<(), JobError>>;
type JobHandler = Arc<dyn Fn(Job) -> HandlerFuture + Send + Sync>;

/// Queue tuning knobs
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum delivery attempts per job
    pub max_attempts: u32,
    /// Base unit for the exponential backoff (`2^attempts` units)
    pub backoff_unit: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

struct QueueState {
    jobs: VecDeque<Job>,
    /// True while a drain task owns the consumer role
    draining: bool,
    /// Retries scheduled but not yet re-appended
    pending_retries: usize,
}

struct QueueInner {
    config: QueueConfig,
    state: Mutex<QueueState>,
    handlers: RwLock<HashMap<String, JobHandler>>,
    idle: Notify,
}

/// Process-wide FIFO job queue.
///
/// Cheaply clonable handle; all clones share the same queue. Delivery
/// is at-least-once while attempts remain. There is deliberately no
/// global ordering guarantee across a delayed retry and newer jobs: a
/// retried job re-enters at the tail and can run after jobs enqueued
/// later.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                config,
                state: Mutex::new(QueueState {
                    jobs: VecDeque::new(),
                    draining: false,
                    pending_retries: 0,
                }),
                handlers: RwLock::new(HashMap::new()),
                idle: Notify::new(),
            }),
        }
    }

    /// Register the handler for a job type, exactly one per type.
    /// Registering again replaces the previous handler.
    pub async fn register_handler<F, Fut>(&self, job_type: impl Into<String>, handler: F)
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let job_type = job_type.into();
        let handler: JobHandler = Arc::new(move |job| Box::pin(handler(job)));
        let mut handlers = self.inner.handlers.write().await;
        if handlers.insert(job_type.clone(), handler).is_some() {
            tracing::warn!(job_type = %job_type, "Replaced existing job handler");
        } else {
            tracing::info!(job_type = %job_type, "Job handler registered");
        }
    }

    /// Append a job to the tail, waking the drain loop if idle
    pub async fn enqueue(&self, job_type: impl Into<String>, payload: serde_json::Value) -> Job {
        let job = Job::new(job_type, payload, self.inner.config.max_attempts);
        tracing::info!(job_id = %job.id, job_type = %job.job_type, "Job enqueued");
        self.push(job.clone(), false).await;
        job
    }

    /// Whether the queue is empty with no drain or scheduled retry in flight
    pub async fn is_idle(&self) -> bool {
        let state = self.inner.state.lock().await;
        state.jobs.is_empty() && !state.draining && state.pending_retries == 0
    }

    /// Wait until the queue has fully quiesced.
    ///
    /// Intended for host shutdown and tests; new enqueues after this
    /// resolves start a fresh drain as usual.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle().await {
                return;
            }
            notified.await;
        }
    }

    /// Append a job and start draining when no consumer is active.
    /// `retry` marks a re-appended job whose retry slot must be released.
    fn push(&self, job: Job, retry: bool) -> futures::future::BoxFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            let start_drain = {
                let mut state = this.inner.state.lock().await;
                if retry {
                    state.pending_retries -= 1;
                }
                state.jobs.push_back(job);
                if state.draining {
                    false
                } else {
                    state.draining = true;
                    true
                }
            };
            if start_drain {
                let queue = this.clone();
                tokio::spawn(async move { queue.drain().await });
            }
        })
    }

    /// Drain loop: pops the head job and runs its handler to completion
    /// until the queue is empty. The single-consumer role is handed off
    /// through the `draining` flag.
    async fn drain(self) {
        loop {
            let job = {
                let mut state = self.inner.state.lock().await;
                match state.jobs.pop_front() {
                    Some(job) => job,
                    None => {
                        state.draining = false;
                        drop(state);
                        self.inner.idle.notify_waiters();
                        return;
                    }
                }
            };

            let handler = self.inner.handlers.read().await.get(&job.job_type).cloned();
            let Some(handler) = handler else {
                tracing::warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    "No handler registered, dropping job"
                );
                continue;
            };

            match handler(job.clone()).await {
                Ok(()) => {
                    tracing::info!(job_id = %job.id, job_type = %job.job_type, "Job completed");
                }
                Err(e) => self.handle_failure(job, e).await,
            }
        }
    }

    /// Schedule a retry with exponential backoff, or drop the job when
    /// its attempts are exhausted.
    async fn handle_failure(&self, mut job: Job, error: JobError) {
        job.attempts += 1;
        if job.attempts >= job.max_attempts {
            tracing::error!(
                job_id = %job.id,
                job_type = %job.job_type,
                attempts = job.attempts,
                error = %error,
                "Job failed permanently, dropping"
            );
            return;
        }

        let delay = self.inner.config.backoff_unit * 2u32.pow(job.attempts);
        tracing::warn!(
            job_id = %job.id,
            job_type = %job.job_type,
            attempts = job.attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Job failed, retrying"
        );

        {
            let mut state = self.inner.state.lock().await;
            state.pending_retries += 1;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.push(job, true).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn fast_queue(max_attempts: u32) -> JobQueue {
        JobQueue::new(QueueConfig {
            max_attempts,
            backoff_unit: Duration::from_secs(1),
        })
    }

    #[tokio::test]
    async fn test_jobs_run_in_fifo_order() {
        let queue = fast_queue(3);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorder = seen.clone();
        queue
            .register_handler("record", move |job: Job| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().await.push(job.payload["n"].as_i64().unwrap());
                    Ok(())
                }
            })
            .await;

        for n in 0..5 {
            queue.enqueue("record", serde_json::json!({ "n": n })).await;
        }
        queue.wait_until_idle().await;

        assert_eq!(*seen.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unregistered_type_is_dropped() {
        let queue = fast_queue(3);
        queue.enqueue("nobody-home", serde_json::json!({})).await;
        queue.wait_until_idle().await;
        assert!(queue.is_idle().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_then_success() {
        let queue = fast_queue(5);
        let calls = Arc::new(AtomicU32::new(0));
        let timestamps = Arc::new(Mutex::new(Vec::new()));

        let call_counter = calls.clone();
        let stamps = timestamps.clone();
        queue
            .register_handler("flaky", move |_job: Job| {
                let call_counter = call_counter.clone();
                let stamps = stamps.clone();
                async move {
                    stamps.lock().await.push(Instant::now());
                    let n = call_counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(JobError::failed("transient"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        queue.enqueue("flaky", serde_json::json!({})).await;
        queue.wait_until_idle().await;

        // Two failures then one success.
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Delays of 2^1 and 2^2 backoff units between attempts.
        let stamps = timestamps.lock().await;
        assert!(stamps[1] - stamps[0] >= Duration::from_secs(2));
        assert!(stamps[2] - stamps[1] >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_drop_the_job() {
        let queue = fast_queue(3);
        let calls = Arc::new(AtomicU32::new(0));

        let call_counter = calls.clone();
        queue
            .register_handler("doomed", move |_job: Job| {
                let call_counter = call_counter.clone();
                async move {
                    call_counter.fetch_add(1, Ordering::SeqCst);
                    Err(JobError::failed("always"))
                }
            })
            .await;

        queue.enqueue("doomed", serde_json::json!({})).await;
        queue.wait_until_idle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(queue.is_idle().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retried_job_reenters_at_the_tail() {
        let queue = fast_queue(3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first_failed = Arc::new(AtomicU32::new(0));

        let recorder = seen.clone();
        let failures = first_failed.clone();
        queue
            .register_handler("mixed", move |job: Job| {
                let recorder = recorder.clone();
                let failures = failures.clone();
                async move {
                    let name = job.payload["name"].as_str().unwrap().to_string();
                    if name == "a" && failures.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err(JobError::failed("first attempt"));
                    }
                    recorder.lock().await.push(name);
                    Ok(())
                }
            })
            .await;

        for name in ["a", "b", "c"] {
            queue
                .enqueue("mixed", serde_json::json!({ "name": name }))
                .await;
        }
        queue.wait_until_idle().await;

        // "a" failed once and re-entered behind the newer jobs.
        assert_eq!(*seen.lock().await, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_drain_restarts_after_idle() {
        let queue = fast_queue(3);
        let calls = Arc::new(AtomicU32::new(0));

        let call_counter = calls.clone();
        queue
            .register_handler("ping", move |_job: Job| {
                let call_counter = call_counter.clone();
                async move {
                    call_counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        queue.enqueue("ping", serde_json::json!({})).await;
        queue.wait_until_idle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        queue.enqueue("ping", serde_json::json!({})).await;
        queue.wait_until_idle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_unit, Duration::from_secs(1));
    }
}
