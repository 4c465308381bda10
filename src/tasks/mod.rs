//! Asynchronous task dispatch.
//!
//! Enqueueing is fire-and-forget: callers get back a task id immediately and
//! never wait on completion. Progress is only observable through the Job
//! records, which the worker mutates out-of-band.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::models::{JobRecord, JobStatus, JobType};
use crate::storage::{Database, DatabaseError, RegistryError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    ParseFile { file_id: String },
    EmbedFile { file_id: String },
    ComputeStats { file_id: String },
    Chat { session_id: String, message: String },
}

impl Task {
    /// Job type for tasks that are tracked through a Job record. Chat work
    /// is not.
    fn job_type(&self) -> Option<JobType> {
        match self {
            Task::ParseFile { .. } => Some(JobType::Parse),
            Task::EmbedFile { .. } => Some(JobType::Embed),
            Task::ComputeStats { .. } => Some(JobType::Stats),
            Task::Chat { .. } => None,
        }
    }

    fn file_id(&self) -> Option<&str> {
        match self {
            Task::ParseFile { file_id }
            | Task::EmbedFile { file_id }
            | Task::ComputeStats { file_id } => Some(file_id),
            Task::Chat { .. } => None,
        }
    }
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Accept a task for later execution and return its id.
    async fn enqueue(&self, task: Task) -> Result<String, DispatchError>;
}

/// In-process dispatcher: records a pending Job and runs the worker on a
/// detached tokio task.
pub struct TaskRunner {
    db: Database,
}

impl TaskRunner {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Dispatcher for TaskRunner {
    async fn enqueue(&self, task: Task) -> Result<String, DispatchError> {
        let Some(job_type) = task.job_type() else {
            // Chat tasks have no Job record; the agent integration is a stub.
            let task_id = uuid::Uuid::new_v4().to_string();
            tracing::debug!(task_id = %task_id, "Accepted chat task");
            return Ok(task_id);
        };

        let job = JobRecord {
            id: uuid::Uuid::new_v4().to_string(),
            file_id: task.file_id().map(|s| s.to_string()),
            job_type,
            status: JobStatus::Pending,
            progress: 0.0,
            error_msg: String::new(),
            created_at: chrono::Utc::now(),
            started_at: None,
            finished_at: None,
        };
        self.db.put_job(&job)?;

        let db = self.db.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            run_job(db, job_id, task).await;
        });

        Ok(job.id)
    }
}

async fn run_job(db: Database, job_id: String, task: Task) {
    if let Err(e) = db.mark_job_running(&job_id) {
        tracing::error!(job_id = %job_id, error = %e, "Failed to mark job running");
        return;
    }

    // Parsing, embedding, and stats pipelines are not implemented yet; the
    // worker only walks the job through its lifecycle.
    match db.mark_job_done(&job_id) {
        Ok(_) => tracing::debug!(job_id = %job_id, ?task, "Job finished"),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job done");
            let _ = db.mark_job_error(&job_id, &e.to_string());
        }
    }
}
