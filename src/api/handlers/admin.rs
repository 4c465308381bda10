use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub files_deleted: u64,
    pub jobs_deleted: u64,
    pub projects_deleted: u64,
    pub users_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let stats = state.db.purge_all()?;

    tracing::warn!(
        users = stats.users,
        files = stats.files,
        projects = stats.projects,
        jobs = stats.jobs,
        "Purged all data"
    );

    Ok(JSend::success(PurgeResponse {
        files_deleted: stats.files,
        jobs_deleted: stats.jobs,
        projects_deleted: stats.projects,
        users_deleted: stats.users,
    }))
}
