use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{
    ApiError, AppQuery, Identity, JSend, JSendPaginated, Pagination,
};
use crate::storage::models::{JobRecord, JobStatus, JobType};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub created_at: String,
    pub error_msg: String,
    pub file_id: Option<String>,
    pub finished_at: Option<String>,
    pub id: String,
    pub job_type: JobType,
    pub progress: f32,
    pub started_at: Option<String>,
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub file_id: Option<String>,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Handlers (read-only: jobs are mutated by the workers executing them)
// ============================================================================

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    AppQuery(params): AppQuery<ListJobsParams>,
) -> Result<Json<JSendPaginated<JobResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let jobs = state.db.list_jobs(params.file_id.as_deref())?;
    let total = jobs.len() as u64;
    let items: Vec<JobResponse> = jobs
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(job_to_response)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<JobResponse>>, ApiError> {
    let job = state
        .db
        .get_job(&id)?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(JSend::success(job_to_response(&job)))
}

// ============================================================================
// Helpers
// ============================================================================

fn job_to_response(job: &JobRecord) -> JobResponse {
    JobResponse {
        created_at: job.created_at.to_rfc3339(),
        error_msg: job.error_msg.clone(),
        file_id: job.file_id.clone(),
        finished_at: job.finished_at.map(|t| t.to_rfc3339()),
        id: job.id.clone(),
        job_type: job.job_type,
        progress: job.progress,
        started_at: job.started_at.map(|t| t.to_rfc3339()),
        status: job.status,
    }
}
