use std::collections::HashMap;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::BytesMut;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{
    ApiError, AppJson, AppQuery, Identity, JSend, JSendPaginated, Pagination,
};
use crate::object_store;
use crate::slug;
use crate::storage::models::{FileRecord, FileStatus};
use crate::tasks::Task;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub created_at: String,
    pub file_extension: String,
    pub file_hash: String,
    pub file_metadata: HashMap<String, serde_json::Value>,
    pub file_name: String,
    pub file_size: u64,
    pub file_status: FileStatus,
    pub file_tags: Vec<String>,
    pub file_type: String,
    pub file_url: Option<String>,
    pub id: String,
    pub owner_id: String,
    pub slug: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateFileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFileStatusRequest {
    pub status: FileStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkFileStatusRequest {
    pub file_ids: Vec<String>,
    pub status: FileStatus,
}

#[derive(Debug, Serialize)]
pub struct BulkFileStatusResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct DownloadUrlResponse {
    pub download_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub status: Option<FileStatus>,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    mut multipart: Multipart,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let mut file_data: Option<BytesMut> = None;
    let mut file_name: Option<String> = None;
    let mut file_content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                file_content_type = field.content_type().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

                if data.len() as u64 > state.config.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {} bytes",
                        state.config.max_upload_size
                    )));
                }

                let mut buf = BytesMut::with_capacity(data.len());
                buf.extend_from_slice(&data);
                file_data = Some(buf);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let file_data = file_data.ok_or_else(|| ApiError::bad_request("file field is required"))?;
    let file_name = file_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "untitled".to_string());

    let file_extension = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!(".{}", ext.to_ascii_lowercase()),
        _ => String::new(),
    };

    // Determine MIME type: from multipart Content-Type, or guess from filename, or fallback
    let file_type = file_content_type
        .filter(|ct| ct != "application/octet-stream")
        .or_else(|| {
            mime_guess::from_path(&file_name)
                .first()
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let file_size = file_data.len() as u64;
    let file_hash = object_store::content_hash(&file_data);
    let id = uuid::Uuid::new_v4().to_string();
    let file_path = format!("uploads/{owner_id}/{id}");
    let now = Utc::now();

    // Phase 1: Upload bytes to object storage. A failure here leaves no row.
    state
        .object_store
        .put(&file_path, file_data.freeze())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to store file");
            ApiError::internal("Failed to store file")
        })?;

    // Phase 2: Write metadata. Status starts at draft regardless of caller.
    let file_record = FileRecord {
        id: id.clone(),
        owner_id,
        slug: slug::slug_for(&file_name, &id),
        file_name,
        file_extension,
        file_type,
        file_size,
        file_url: state.object_store.retrieve_url(&file_path),
        file_path,
        file_hash,
        file_status: FileStatus::Draft,
        file_metadata: HashMap::new(),
        file_tags: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = state.db.put_file(&file_record) {
        // Best-effort cleanup of the uploaded blob
        let _ = state.object_store.delete(&file_record.file_path).await;
        return Err(e.into());
    }

    // Kick off parsing. Fire-and-forget: a dispatch failure does not fail
    // the upload.
    if let Err(e) = state
        .dispatcher
        .enqueue(Task::ParseFile {
            file_id: id.clone(),
        })
        .await
    {
        tracing::warn!(file_id = %id, error = %e, "Failed to enqueue parse task");
    }

    tracing::debug!(file_id = %id, slug = %file_record.slug, "Uploaded file");

    Ok(JSend::success(file_to_response(&file_record)))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let file = owned_file(&state, &owner_id, &id)?;
    Ok(JSend::success(file_to_response(&file)))
}

pub async fn update_file_metadata(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateFileRequest>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    if req.name.is_none() && req.metadata.is_none() && req.tags.is_none() {
        return Err(ApiError::bad_request(
            "at least one field (name, metadata, tags) must be provided",
        ));
    }

    owned_file(&state, &owner_id, &id)?;

    let file = state.db.update_file_metadata(
        &id,
        req.name.as_deref(),
        req.metadata.as_ref(),
        req.tags.as_deref(),
    )?;

    tracing::debug!(file_id = %id, "Updated file metadata");
    Ok(JSend::success(file_to_response(&file)))
}

pub async fn update_file_status(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateFileStatusRequest>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    owned_file(&state, &owner_id, &id)?;

    let file = state.db.set_file_status(&id, req.status)?;

    tracing::debug!(file_id = %id, status = file.file_status.as_str(), "Updated file status");
    Ok(JSend::success(file_to_response(&file)))
}

pub async fn bulk_update_file_status(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    AppJson(req): AppJson<BulkFileStatusRequest>,
) -> Result<Json<JSend<BulkFileStatusResponse>>, ApiError> {
    let updated = state
        .db
        .bulk_set_file_status(&owner_id, &req.file_ids, req.status)?;

    tracing::debug!(updated, status = req.status.as_str(), "Bulk updated file status");
    Ok(JSend::success(BulkFileStatusResponse { updated }))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let files = state.db.list_files(&owner_id, params.status)?;
    let total = files.len() as u64;
    let items: Vec<FileResponse> = files
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(file_to_response)
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

/// Serve file content. With local storage the bytes are streamed directly;
/// other backends answer with a retrieval URL instead.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = owned_file(&state, &owner_id, &id)?;

    if !state.config.is_local_storage() {
        let download_url = state
            .object_store
            .retrieve_url(&file.file_path)
            .ok_or_else(|| ApiError::internal("Storage backend provided no URL"))?;
        return Ok(JSend::success(DownloadUrlResponse { download_url }).into_response());
    }

    let data = state
        .object_store
        .get(&file.file_path)
        .await
        .map_err(|e| match e {
            crate::object_store::ObjectStoreError::NotFound(_) => {
                ApiError::not_found("File content not found")
            }
            _ => {
                tracing::error!(error = %e, "Failed to retrieve file");
                ApiError::internal("Failed to retrieve file")
            }
        })?;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        file.file_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        header::HeaderValue::from(file.file_size),
    );

    if let Ok(value) = format!("attachment; filename=\"{}\"", file.file_name).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolve a file the caller owns. A file owned by someone else is
/// indistinguishable from a missing one.
fn owned_file(state: &AppState, owner_id: &str, id: &str) -> Result<FileRecord, ApiError> {
    match state.db.get_file(id)? {
        Some(file) if file.owner_id == owner_id => Ok(file),
        _ => Err(ApiError::not_found("File not found")),
    }
}

pub(super) fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        created_at: file.created_at.to_rfc3339(),
        file_extension: file.file_extension.clone(),
        file_hash: file.file_hash.clone(),
        file_metadata: file.file_metadata.clone(),
        file_name: file.file_name.clone(),
        file_size: file.file_size,
        file_status: file.file_status,
        file_tags: file.file_tags.clone(),
        file_type: file.file_type.clone(),
        file_url: file.file_url.clone(),
        id: file.id.clone(),
        owner_id: file.owner_id.clone(),
        slug: file.slug.clone(),
        updated_at: file.updated_at.to_rfc3339(),
    }
}
