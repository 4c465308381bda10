use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use crate::api::response::{
    ApiError, AppJson, AppQuery, Identity, JSend, JSendPaginated, Pagination,
};
use crate::slug;
use crate::storage::models::{ProjectFlag, ProjectRecord, ProjectStatus};
use crate::storage::{ProjectOrder, ProjectQuery};
use crate::AppState;

/// Most projects one bulk-create call may generate.
const MAX_BULK_CREATE: u32 = 100;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub created_at: String,
    pub description: Option<String>,
    pub id: String,
    pub is_archived: bool,
    pub is_deleted: bool,
    pub is_favorite: bool,
    pub is_pinned: bool,
    pub is_shared: bool,
    pub name: String,
    pub owner_id: String,
    pub slug: String,
    pub status: ProjectStatus,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectStatusRequest {
    pub status: ProjectStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateResponse {
    pub created: u64,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub project_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub project_ids: Vec<String>,
    pub action: String,
    #[serde(default)]
    pub action_value: Option<bool>,
    #[serde(default)]
    pub new_status: Option<ProjectStatus>,
}

#[derive(Debug, Serialize)]
pub struct BulkUpdateResponse {
    pub updated: u64,
}

#[derive(Debug, Deserialize)]
pub struct BulkAttachRequest {
    pub file_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkAttachResponse {
    pub attached: u64,
}

#[derive(Debug, Serialize)]
pub struct BulkDetachResponse {
    pub detached: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListProjectsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub is_archived: Option<bool>,
    #[serde(default)]
    pub is_pinned: Option<bool>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub is_shared: Option<bool>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub ordering: Option<String>,
}

fn default_limit() -> u32 {
    20
}

/// Distinguishes between a missing field (`None`) and an explicit `null` (`Some(None)`).
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: DeserializeOwned,
    D: Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

impl ListProjectsParams {
    fn into_query(self) -> Result<(ProjectQuery, u32, u32), ApiError> {
        if self.limit == 0 {
            return Err(ApiError::bad_request("limit must be greater than 0"));
        }

        let order = match self.ordering.as_deref() {
            Some(value) => ProjectOrder::parse(value).ok_or_else(|| {
                ApiError::bad_request(format!("Invalid ordering value: '{value}'"))
            })?,
            None => ProjectOrder::default(),
        };

        Ok((
            ProjectQuery {
                name: self.name,
                status: self.status,
                is_archived: self.is_archived,
                is_pinned: self.is_pinned,
                is_favorite: self.is_favorite,
                is_shared: self.is_shared,
                created_after: self.created_after,
                created_before: self.created_before,
                updated_after: self.updated_after,
                updated_before: self.updated_before,
                search: self.search,
                order,
            },
            self.limit,
            self.offset,
        ))
    }
}

// ============================================================================
// CRUD handlers
// ============================================================================

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    AppJson(req): AppJson<CreateProjectRequest>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    validate_name(&req.name)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    let project = ProjectRecord {
        slug: slug::slug_for(&req.name, &id),
        id,
        owner_id,
        name: req.name,
        description: req.description,
        status: req.status.unwrap_or(ProjectStatus::Draft),
        is_deleted: false,
        is_archived: false,
        is_pinned: false,
        is_favorite: false,
        is_shared: false,
        created_at: now,
        updated_at: now,
    };

    state.db.put_project(&project)?;

    tracing::debug!(project_id = %project.id, slug = %project.slug, "Created project");
    Ok(JSend::success(project_to_response(&project)))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    let project = state.db.get_project_owned(&id, &owner_id)?;
    Ok(JSend::success(project_to_response(&project)))
}

pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateProjectRequest>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    if req.name.is_none() && req.description.is_none() {
        return Err(ApiError::bad_request(
            "at least one field (name, description) must be provided",
        ));
    }

    let project = state.db.update_project(
        &id,
        &owner_id,
        req.name.as_deref(),
        req.description.as_ref().map(|d| d.as_deref()),
    )?;

    tracing::debug!(project_id = %id, "Updated project");
    Ok(JSend::success(project_to_response(&project)))
}

/// Soft delete: the row is flagged, never removed, and disappears from
/// every listing.
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.db.soft_delete_project(&id, &owner_id)?;

    tracing::debug!(project_id = %id, "Soft-deleted project");
    Ok(JSend::success(()))
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    AppQuery(params): AppQuery<ListProjectsParams>,
) -> Result<Json<JSendPaginated<ProjectResponse>>, ApiError> {
    let (query, limit, offset) = params.into_query()?;
    list_with(&state, &owner_id, query, limit, offset)
}

// ============================================================================
// Flag and status handlers
// ============================================================================

pub async fn toggle_pin(
    state: State<Arc<AppState>>,
    identity: Identity,
    path: Path<String>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    toggle_flag(state, identity, path, ProjectFlag::Pinned).await
}

pub async fn toggle_favorite(
    state: State<Arc<AppState>>,
    identity: Identity,
    path: Path<String>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    toggle_flag(state, identity, path, ProjectFlag::Favorite).await
}

pub async fn toggle_share(
    state: State<Arc<AppState>>,
    identity: Identity,
    path: Path<String>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    toggle_flag(state, identity, path, ProjectFlag::Shared).await
}

async fn toggle_flag(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
    flag: ProjectFlag,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    let project = state.db.toggle_project_flag(&id, &owner_id, flag)?;
    Ok(JSend::success(project_to_response(&project)))
}

pub async fn update_project_status(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateProjectStatusRequest>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    let project = state.db.set_project_status(&id, &owner_id, req.status)?;

    tracing::debug!(project_id = %id, status = project.status.as_str(), "Updated project status");
    Ok(JSend::success(project_to_response(&project)))
}

pub async fn archive_project(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    let project = state.db.set_project_archived(&id, &owner_id, true)?;
    Ok(JSend::success(project_to_response(&project)))
}

pub async fn unarchive_project(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    let project = state.db.set_project_archived(&id, &owner_id, false)?;
    Ok(JSend::success(project_to_response(&project)))
}

pub async fn publish_project(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    let project = state
        .db
        .set_project_status(&id, &owner_id, ProjectStatus::Published)?;
    Ok(JSend::success(project_to_response(&project)))
}

pub async fn unpublish_project(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<ProjectResponse>>, ApiError> {
    let project = state
        .db
        .set_project_status(&id, &owner_id, ProjectStatus::Draft)?;
    Ok(JSend::success(project_to_response(&project)))
}

// ============================================================================
// Shortcut listings
// ============================================================================

pub async fn pinned_projects(
    state: State<Arc<AppState>>,
    identity: Identity,
    params: AppQuery<ListProjectsParams>,
) -> Result<Json<JSendPaginated<ProjectResponse>>, ApiError> {
    flagged_projects(state, identity, params, ProjectFlag::Pinned).await
}

pub async fn favorite_projects(
    state: State<Arc<AppState>>,
    identity: Identity,
    params: AppQuery<ListProjectsParams>,
) -> Result<Json<JSendPaginated<ProjectResponse>>, ApiError> {
    flagged_projects(state, identity, params, ProjectFlag::Favorite).await
}

pub async fn shared_projects(
    state: State<Arc<AppState>>,
    identity: Identity,
    params: AppQuery<ListProjectsParams>,
) -> Result<Json<JSendPaginated<ProjectResponse>>, ApiError> {
    flagged_projects(state, identity, params, ProjectFlag::Shared).await
}

pub async fn archived_projects(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    AppQuery(params): AppQuery<ListProjectsParams>,
) -> Result<Json<JSendPaginated<ProjectResponse>>, ApiError> {
    let (mut query, limit, offset) = params.into_query()?;
    query.is_archived = Some(true);
    list_with(&state, &owner_id, query, limit, offset)
}

async fn flagged_projects(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    AppQuery(params): AppQuery<ListProjectsParams>,
    flag: ProjectFlag,
) -> Result<Json<JSendPaginated<ProjectResponse>>, ApiError> {
    let (mut query, limit, offset) = params.into_query()?;
    match flag {
        ProjectFlag::Pinned => query.is_pinned = Some(true),
        ProjectFlag::Favorite => query.is_favorite = Some(true),
        ProjectFlag::Shared => query.is_shared = Some(true),
        ProjectFlag::Deleted => {}
    }
    list_with(&state, &owner_id, query, limit, offset)
}

// ============================================================================
// Bulk handlers
// ============================================================================

pub async fn bulk_create_projects(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    AppJson(req): AppJson<BulkCreateRequest>,
) -> Result<Json<JSend<BulkCreateResponse>>, ApiError> {
    validate_name(&req.name)?;
    if req.count == 0 || req.count > MAX_BULK_CREATE {
        return Err(ApiError::bad_request(format!(
            "count must be between 1 and {MAX_BULK_CREATE}"
        )));
    }

    let projects = crate::storage::build_project_batch(
        &owner_id,
        &req.name,
        req.description.as_deref(),
        req.status.unwrap_or(ProjectStatus::Draft),
        req.count,
    );

    state.db.bulk_insert_projects(&projects)?;

    tracing::debug!(count = projects.len(), "Bulk created projects");
    Ok(JSend::success(BulkCreateResponse {
        created: projects.len() as u64,
    }))
}

pub async fn bulk_delete_projects(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    AppJson(req): AppJson<BulkDeleteRequest>,
) -> Result<Json<JSend<BulkDeleteResponse>>, ApiError> {
    let deleted = state
        .db
        .bulk_soft_delete_projects(&owner_id, &req.project_ids)?;

    tracing::debug!(deleted, "Bulk soft-deleted projects");
    Ok(JSend::success(BulkDeleteResponse { deleted }))
}

/// One field set per call: either a boolean flag named by `action`, or a
/// status update when a valid `new_status` is supplied.
pub async fn bulk_update_projects(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    AppJson(req): AppJson<BulkUpdateRequest>,
) -> Result<Json<JSend<BulkUpdateResponse>>, ApiError> {
    let updated = match ProjectFlag::from_action(&req.action) {
        Some(flag) => {
            let value = req.action_value.ok_or_else(|| {
                ApiError::bad_request(format!(
                    "action_value is required for action '{}'",
                    req.action
                ))
            })?;
            state
                .db
                .bulk_set_project_flag(&owner_id, &req.project_ids, flag, value)?
        }
        None => match req.new_status {
            Some(status) => {
                state
                    .db
                    .bulk_set_project_status(&owner_id, &req.project_ids, status)?
            }
            None => {
                return Err(ApiError::bad_request(format!(
                    "unrecognized action '{}' and no valid new_status provided",
                    req.action
                )));
            }
        },
    };

    tracing::debug!(updated, action = %req.action, "Bulk updated projects");
    Ok(JSend::success(BulkUpdateResponse { updated }))
}

// ============================================================================
// Attachment handlers
// ============================================================================

pub async fn attach_file(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path((id, file_id)): Path<(String, String)>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.db.attach_file(&id, &owner_id, &file_id)?;

    tracing::debug!(project_id = %id, file_id = %file_id, "Attached file");
    Ok(JSend::success(()))
}

pub async fn detach_file(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path((id, file_id)): Path<(String, String)>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.db.detach_file(&id, &owner_id, &file_id)?;

    tracing::debug!(project_id = %id, file_id = %file_id, "Detached file");
    Ok(JSend::success(()))
}

pub async fn bulk_attach_files(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
    AppJson(req): AppJson<BulkAttachRequest>,
) -> Result<Json<JSend<BulkAttachResponse>>, ApiError> {
    let attached = state.db.bulk_attach_files(&id, &owner_id, &req.file_ids)?;

    tracing::debug!(project_id = %id, attached, "Bulk attached files");
    Ok(JSend::success(BulkAttachResponse { attached }))
}

pub async fn bulk_detach_files(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
    AppJson(req): AppJson<BulkAttachRequest>,
) -> Result<Json<JSend<BulkDetachResponse>>, ApiError> {
    let detached = state.db.bulk_detach_files(&id, &owner_id, &req.file_ids)?;

    tracing::debug!(project_id = %id, detached, "Bulk detached files");
    Ok(JSend::success(BulkDetachResponse { detached }))
}

pub async fn list_project_files(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<Vec<super::files::FileResponse>>>, ApiError> {
    let files = state.db.project_files(&id, &owner_id)?;
    let items = files.iter().map(super::files::file_to_response).collect();
    Ok(JSend::success(items))
}

// ============================================================================
// Helpers
// ============================================================================

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    if name.len() > 255 {
        return Err(ApiError::bad_request(
            "name must be at most 255 characters",
        ));
    }
    Ok(())
}

fn list_with(
    state: &AppState,
    owner_id: &str,
    query: ProjectQuery,
    limit: u32,
    offset: u32,
) -> Result<Json<JSendPaginated<ProjectResponse>>, ApiError> {
    let projects = state.db.list_projects(owner_id, &query)?;
    let total = projects.len() as u64;
    let items: Vec<ProjectResponse> = projects
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .map(project_to_response)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit,
            offset,
            total,
        },
    ))
}

fn project_to_response(project: &ProjectRecord) -> ProjectResponse {
    ProjectResponse {
        created_at: project.created_at.to_rfc3339(),
        description: project.description.clone(),
        id: project.id.clone(),
        is_archived: project.is_archived,
        is_deleted: project.is_deleted,
        is_favorite: project.is_favorite,
        is_pinned: project.is_pinned,
        is_shared: project.is_shared,
        name: project.name.clone(),
        owner_id: project.owner_id.clone(),
        slug: project.slug.clone(),
        status: project.status,
        updated_at: project.updated_at.to_rfc3339(),
    }
}
