//! In-process job broker
//!
//! Jobs are queued on an unbounded channel and pulled by a fixed pool of
//! workers. Each delivery runs in its own spawned task; when that task panics
//! the job is delivered again, up to `max_deliveries`, and then marked failed.
//! Pipeline errors are not redelivered: the pipeline has already recorded them.
//!
//! The pipeline saves its result before marking the job completed; the broker
//! only reads results back for callers.

use crate::config::IngestConfig;
use crate::error::PipelineError;
use crate::models::{FetchRequest, JobHandle, JobStatus, PipelineResult};
use crate::services::source_client::{build_http_client, build_rate_limiter, DirectRateLimiter};
use crate::services::{HackerNewsClient, PipelineOrchestrator, ProgressTracker, ResultStore, SourceSettings};
use async_trait::async_trait;
use hn_common::KeyValueCache;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Executes one delivery of a job
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job_id: &str, request: &FetchRequest) -> Result<PipelineResult, PipelineError>;
}

/// Runs the fetch-and-store pipeline with a client built for the job
pub struct PipelineRunner {
    pool: SqlitePool,
    cache: Arc<dyn KeyValueCache>,
    tracker: ProgressTracker,
    results: ResultStore,
    http: reqwest::Client,
    rate_limiter: Arc<DirectRateLimiter>,
    settings: SourceSettings,
    max_lock_wait_ms: u64,
}

impl PipelineRunner {
    pub fn new(
        config: &IngestConfig,
        pool: SqlitePool,
        cache: Arc<dyn KeyValueCache>,
        tracker: ProgressTracker,
        results: ResultStore,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            pool,
            cache,
            tracker,
            results,
            http: build_http_client(&config.upstream)?,
            rate_limiter: build_rate_limiter(config.upstream.requests_per_second),
            settings: SourceSettings::from_config(config),
            max_lock_wait_ms: config.database.max_lock_wait_ms,
        })
    }

    /// Orchestrator with a fresh client sharing the connection pool and limiter
    fn orchestrator(&self) -> PipelineOrchestrator {
        let client = HackerNewsClient::new(
            self.settings.clone(),
            self.http.clone(),
            Arc::clone(&self.rate_limiter),
            Arc::clone(&self.cache),
        );
        PipelineOrchestrator::new(
            client,
            self.pool.clone(),
            self.tracker.clone(),
            self.results.clone(),
            self.max_lock_wait_ms,
        )
    }
}

#[async_trait]
impl JobRunner for PipelineRunner {
    async fn run(&self, job_id: &str, request: &FetchRequest) -> Result<PipelineResult, PipelineError> {
        self.orchestrator().run(job_id, request).await
    }
}

#[derive(Debug, Clone)]
struct QueuedJob {
    job_id: String,
    request: FetchRequest,
}

/// Broker settings
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub worker_count: usize,
    pub max_deliveries: u32,
}

impl BrokerSettings {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            worker_count: config.workers.count.max(1),
            max_deliveries: config.workers.max_deliveries.max(1),
        }
    }
}

struct BrokerInner {
    sender: mpsc::UnboundedSender<QueuedJob>,
    tracker: ProgressTracker,
    results: ResultStore,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to the worker pool, cheap to clone
#[derive(Clone)]
pub struct JobBroker {
    inner: Arc<BrokerInner>,
}

impl JobBroker {
    /// Spawn the workers and return the submission handle
    pub fn start(
        runner: Arc<dyn JobRunner>,
        tracker: ProgressTracker,
        results: ResultStore,
        settings: BrokerSettings,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let queue = Arc::new(Mutex::new(receiver));

        let workers = (0..settings.worker_count)
            .map(|worker_id| {
                let worker = Worker {
                    worker_id,
                    queue: Arc::clone(&queue),
                    runner: Arc::clone(&runner),
                    tracker: tracker.clone(),
                    max_deliveries: settings.max_deliveries,
                    shutdown: shutdown_rx.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!(
            workers = settings.worker_count,
            max_deliveries = settings.max_deliveries,
            "Job broker started"
        );

        Self {
            inner: Arc::new(BrokerInner {
                sender,
                tracker,
                results,
                shutdown,
                workers: Mutex::new(workers),
            }),
        }
    }

    /// Record the job as accepted, enqueue it and return immediately
    pub async fn submit(&self, request: FetchRequest) -> JobHandle {
        let job_id = Uuid::new_v4().to_string();
        let mut record = self
            .inner
            .tracker
            .update(&job_id, JobStatus::Accepted, 0, "Job accepted, waiting for a worker")
            .await;

        let queued = QueuedJob {
            job_id: job_id.clone(),
            request,
        };

        if self.inner.sender.send(queued).is_err() {
            error!(job_id = %job_id, "Job queue is closed, job will not run");
            record = self
                .inner
                .tracker
                .update(&job_id, JobStatus::Failed, 0, "Job queue is closed")
                .await;
        } else {
            info!(job_id = %job_id, "Job queued");
        }

        JobHandle {
            job_id,
            status: record.status,
            message: record.message,
            timestamp: record.created_at,
        }
    }

    /// Result of a completed job, `None` if unknown, unfinished or expired
    pub async fn result(&self, job_id: &str) -> Option<PipelineResult> {
        self.inner.results.get(job_id).await
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.inner.tracker
    }

    /// Stop taking new jobs and wait for in-flight jobs to finish
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown.send(true);

        let workers: Vec<JoinHandle<()>> = self.inner.workers.lock().await.drain(..).collect();
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker did not shut down cleanly");
            }
        }

        info!("Job broker stopped");
    }
}

struct Worker {
    worker_id: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    runner: Arc<dyn JobRunner>,
    tracker: ProgressTracker,
    max_deliveries: u32,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        debug!(worker_id = self.worker_id, "Worker started");
        let queue = Arc::clone(&self.queue);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                job = async { queue.lock().await.recv().await } => job,
                _ = self.shutdown.changed() => None,
            };

            let Some(job) = next else {
                break;
            };

            self.process(job).await;
        }

        debug!(worker_id = self.worker_id, "Worker stopped");
    }

    async fn process(&self, job: QueuedJob) {
        for delivery in 1..=self.max_deliveries {
            debug!(worker_id = self.worker_id, job_id = %job.job_id, delivery, "Delivering job");

            let runner = Arc::clone(&self.runner);
            let job_id = job.job_id.clone();
            let request = job.request.clone();
            let task = tokio::spawn(async move { runner.run(&job_id, &request).await });

            match task.await {
                Ok(Ok(result)) => {
                    debug!(
                        job_id = %job.job_id,
                        stored = result.storage.stored_count,
                        "Job finished"
                    );
                    return;
                }
                Ok(Err(e)) => {
                    debug!(job_id = %job.job_id, error = %e, "Job finished with error");
                    return;
                }
                Err(join_err) if join_err.is_panic() => {
                    warn!(
                        worker_id = self.worker_id,
                        job_id = %job.job_id,
                        delivery,
                        max_deliveries = self.max_deliveries,
                        "Job task panicked"
                    );
                }
                Err(join_err) => {
                    error!(job_id = %job.job_id, error = %join_err, "Job task was cancelled");
                    self.tracker
                        .update(&job.job_id, JobStatus::Failed, 0, "Job task was cancelled")
                        .await;
                    return;
                }
            }
        }

        self.tracker
            .update(
                &job.job_id,
                JobStatus::Failed,
                0,
                format!("Job abandoned after {} deliveries: worker task panicked", self.max_deliveries),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FiltersApplied, UpsertSummary};
    use hn_common::cache::InMemoryCache;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Panics on its first deliveries, then records a result like the pipeline
    struct FlakyRunner {
        panics_before_success: u32,
        calls: AtomicU32,
        tracker: ProgressTracker,
        results: ResultStore,
    }

    impl FlakyRunner {
        fn new(panics_before_success: u32) -> Self {
            let cache: Arc<dyn KeyValueCache> = Arc::new(InMemoryCache::new());
            Self {
                panics_before_success,
                calls: AtomicU32::new(0),
                tracker: ProgressTracker::new(Arc::clone(&cache), Duration::from_secs(60)),
                results: ResultStore::new(cache, Duration::from_secs(60)),
            }
        }
    }

    #[async_trait]
    impl JobRunner for FlakyRunner {
        async fn run(&self, job_id: &str, _request: &FetchRequest) -> Result<PipelineResult, PipelineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.panics_before_success {
                panic!("simulated worker crash");
            }
            let result = PipelineResult {
                job_id: job_id.to_string(),
                ids_discovered: 0,
                items_fetched: 0,
                items_filtered: 0,
                storage: UpsertSummary::default(),
                filters_applied: FiltersApplied::default(),
            };
            self.results.save(&result).await;
            self.tracker.update(job_id, JobStatus::Completed, 100, "done").await;
            Ok(result)
        }
    }

    fn broker_with(runner: Arc<FlakyRunner>, max_deliveries: u32) -> JobBroker {
        let tracker = runner.tracker.clone();
        let results = runner.results.clone();
        JobBroker::start(
            runner,
            tracker,
            results,
            BrokerSettings {
                worker_count: 1,
                max_deliveries,
            },
        )
    }

    async fn wait_for_terminal(broker: &JobBroker, job_id: &str) -> crate::models::JobProgress {
        for _ in 0..200 {
            if let Some(record) = broker.tracker().get(job_id).await {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        broker.tracker().get(job_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_accepted_handle() {
        let broker = broker_with(Arc::new(FlakyRunner::new(0)), 2);

        let handle = broker.submit(FetchRequest::default()).await;
        assert_eq!(handle.status, JobStatus::Accepted);
        assert!(Uuid::parse_str(&handle.job_id).is_ok());

        wait_for_terminal(&broker, &handle.job_id).await;
        assert!(broker.result(&handle.job_id).await.is_some());
        broker.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicked_job_is_redelivered() {
        let runner = Arc::new(FlakyRunner::new(1));
        let broker = broker_with(Arc::clone(&runner), 2);

        let handle = broker.submit(FetchRequest::default()).await;
        wait_for_terminal(&broker, &handle.job_id).await;

        assert!(broker.result(&handle.job_id).await.is_some());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
        broker.shutdown().await;
    }

    #[tokio::test]
    async fn test_job_failed_after_max_deliveries() {
        let runner = Arc::new(FlakyRunner::new(u32::MAX));
        let broker = broker_with(Arc::clone(&runner), 2);

        let handle = broker.submit(FetchRequest::default()).await;
        let record = wait_for_terminal(&broker, &handle.job_id).await;

        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.progress, 0);
        assert!(record.message.contains("panicked"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
        broker.shutdown().await;
    }
}
