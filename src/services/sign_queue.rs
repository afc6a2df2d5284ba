//! In-process sign job queue with a fixed worker pool.
//!
//! Each job is received by exactly one worker and executed once; failures
//! are recorded on the job and never retried.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::common::config::QueueConfig;
use crate::common::error::{AppError, AppResult};
use crate::models::sign::{JobStatus, SignJob, SignPayload};
use crate::services::file_store::TempFileStore;
use crate::services::sign::SignService;

/// Lifecycle notifications for downstream consumers
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Active { id: Uuid },
    Completed { id: Uuid, document: String },
    Failed { id: Uuid, error: String },
}

/// Work performed for each dequeued job
#[async_trait]
pub trait SignExecutor: Send + Sync {
    async fn execute(&self, payload: &SignPayload) -> AppResult<String>;
}

#[async_trait]
impl SignExecutor for SignService {
    async fn execute(&self, payload: &SignPayload) -> AppResult<String> {
        self.sign(&payload.document, &payload.certificate_keys).await
    }
}

struct QueuedJob {
    id: Uuid,
    payload: SignPayload,
}

struct JobRegistry {
    jobs: HashMap<Uuid, SignJob>,
    finished: VecDeque<Uuid>,
    retention: usize,
}

impl JobRegistry {
    /// Record a finished job; returns documents of jobs evicted to stay within retention
    fn finish(&mut self, id: Uuid, result: Result<String, String>) -> Vec<String> {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.finished_at = Some(Utc::now());
            match result {
                Ok(document) => {
                    job.status = JobStatus::Completed;
                    job.document = Some(document);
                }
                Err(message) => {
                    job.status = JobStatus::Failed;
                    job.error = Some(message);
                }
            }
        }
        self.finished.push_back(id);

        let mut evicted = Vec::new();
        while self.finished.len() > self.retention {
            if let Some(old_id) = self.finished.pop_front() {
                if let Some(document) = self.jobs.remove(&old_id).and_then(|job| job.document) {
                    evicted.push(document);
                }
            }
        }
        evicted
    }
}

#[derive(Clone)]
pub struct SignQueue {
    sender: mpsc::Sender<QueuedJob>,
    registry: Arc<RwLock<JobRegistry>>,
    events: broadcast::Sender<JobEvent>,
}

impl SignQueue {
    /// Create the queue and spawn its workers on the current runtime
    pub fn start(executor: Arc<dyn SignExecutor>, store: TempFileStore, config: &QueueConfig) -> Self {
        let (sender, receiver) = mpsc::channel::<QueuedJob>(config.capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let (events, _) = broadcast::channel(config.capacity.max(16));
        let registry = Arc::new(RwLock::new(JobRegistry {
            jobs: HashMap::new(),
            finished: VecDeque::new(),
            // a finished job must outlive its own completion event
            retention: config.retention.max(1),
        }));

        for worker_id in 0..config.workers {
            let worker = Worker {
                id: worker_id,
                receiver: Arc::clone(&receiver),
                executor: Arc::clone(&executor),
                registry: Arc::clone(&registry),
                events: events.clone(),
                store: store.clone(),
            };
            tokio::spawn(worker.run());
        }

        info!("Sign queue started with {} workers", config.workers);

        Self {
            sender,
            registry,
            events,
        }
    }

    pub async fn enqueue(&self, payload: SignPayload) -> AppResult<Uuid> {
        let id = Uuid::new_v4();
        let job = SignJob::queued(id, payload.certificate_keys.clone());
        self.registry.write().await.jobs.insert(id, job);

        if let Err(e) = self.sender.try_send(QueuedJob { id, payload }) {
            self.registry.write().await.jobs.remove(&id);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Sign queue is full, rejecting job {}", id);
                    AppError::QueueFull
                }
                mpsc::error::TrySendError::Closed(_) => {
                    error!("Sign queue is closed, rejecting job {}", id);
                    AppError::QueueFull
                }
            });
        }

        info!("Queued sign job {}", id);
        Ok(id)
    }

    pub async fn job(&self, id: Uuid) -> Option<SignJob> {
        self.registry.read().await.jobs.get(&id).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }
}

struct Worker {
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    executor: Arc<dyn SignExecutor>,
    registry: Arc<RwLock<JobRegistry>>,
    events: broadcast::Sender<JobEvent>,
    store: TempFileStore,
}

impl Worker {
    async fn run(self) {
        loop {
            let job = {
                let mut receiver = self.receiver.lock().await;
                match receiver.recv().await {
                    Some(job) => job,
                    None => {
                        info!("Sign worker {} shutting down (queue closed)", self.id);
                        return;
                    }
                }
            };
            self.process(job).await;
        }
    }

    async fn process(&self, job: QueuedJob) {
        let QueuedJob { id, payload } = job;

        if let Some(record) = self.registry.write().await.jobs.get_mut(&id) {
            record.status = JobStatus::Active;
            record.started_at = Some(Utc::now());
        }
        info!(
            "Processing sign job {} on worker {} ({} certificates)",
            id,
            self.id,
            payload.certificate_keys.len()
        );
        let _ = self.events.send(JobEvent::Active { id });

        // Run on its own task so a panic fails the job, not the worker
        let executor = Arc::clone(&self.executor);
        let result = match tokio::spawn(async move { executor.execute(&payload).await }).await {
            Ok(Ok(document)) => Ok(document),
            Ok(Err(e)) => Err(e.to_string()),
            Err(join_error) => Err(format!("sign job aborted: {}", join_error)),
        };

        let event = match &result {
            Ok(document) => {
                info!("Completed sign job {}", id);
                JobEvent::Completed {
                    id,
                    document: document.clone(),
                }
            }
            Err(message) => {
                error!("Sign job {} failed: {}", id, message);
                JobEvent::Failed {
                    id,
                    error: message.clone(),
                }
            }
        };

        {
            // evicted documents go before other readers see the new registry state
            let mut registry = self.registry.write().await;
            for document in registry.finish(id, result) {
                if let Err(e) = self.store.remove_if_exists(&document) {
                    warn!("Could not delete evicted document {}: {}", document, e);
                }
            }
        }

        let _ = self.events.send(event);
    }
}

/// Log lifecycle events; stands in for the delivery of signed documents
pub async fn log_job_events(mut receiver: broadcast::Receiver<JobEvent>) {
    loop {
        match receiver.recv().await {
            Ok(JobEvent::Active { id }) => info!(job_id = %id, "sign job active"),
            Ok(JobEvent::Completed { id, document }) => {
                info!(job_id = %id, document = %document, "sign job completed")
            }
            Ok(JobEvent::Failed { id, error }) => error!(job_id = %id, error = %error, "sign job failed"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Job event listener lagged, skipped {} events", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
