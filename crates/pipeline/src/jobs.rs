//! Background job tracking.
//!
//! Long-running work (extraction, validation) is submitted as a tokio task
//! and observed through a job record. Records are kept in memory for the
//! life of the process; callers poll by job id.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

pub type JobId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "error")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub label: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct JobQueue {
    jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` as a background task and return its job id immediately.
    /// The record moves Queued -> Running -> Completed/Failed.
    pub async fn submit<F>(&self, label: &str, work: F) -> JobId
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.jobs.write().await.insert(
            id,
            JobRecord {
                id,
                label: label.to_string(),
                status: JobStatus::Queued,
                submitted_at: now,
                updated_at: now,
            },
        );
        info!(job_id = %id, label, "job submitted");

        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            set_status(&jobs, id, JobStatus::Running).await;
            match work.await {
                Ok(()) => {
                    info!(job_id = %id, "job completed");
                    set_status(&jobs, id, JobStatus::Completed).await;
                }
                Err(e) => {
                    error!(job_id = %id, %e, "job failed");
                    set_status(&jobs, id, JobStatus::Failed(e.to_string())).await;
                }
            }
        });

        id
    }

    pub async fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// True once the job has left the Queued/Running states.
    pub async fn is_finished(&self, id: JobId) -> bool {
        matches!(
            self.jobs.read().await.get(&id).map(|j| &j.status),
            Some(JobStatus::Completed) | Some(JobStatus::Failed(_))
        )
    }
}

async fn set_status(jobs: &RwLock<HashMap<JobId, JobRecord>>, id: JobId, status: JobStatus) {
    if let Some(record) = jobs.write().await.get_mut(&id) {
        record.status = status;
        record.updated_at = Utc::now();
    }
}
