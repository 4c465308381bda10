use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing lifecycle of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Draft,
    Pending,
    Processed,
    Failed,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Draft => "draft",
            FileStatus::Pending => "pending",
            FileStatus::Processed => "processed",
            FileStatus::Failed => "failed",
        }
    }

    /// Single-file transition table. `failed` is terminal.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        use FileStatus::*;
        matches!(
            (self, next),
            (Draft, Pending) | (Draft, Processed) | (Pending, Processed) | (Processed, Draft)
        )
    }
}

/// Publication lifecycle of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Published,
    InProgress,
    Failed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Published => "published",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Archived => "archived",
        }
    }

    /// Transition table for the single-project status path. The bulk engine's
    /// `update-status` action does not consult this table.
    pub fn can_transition_to(self, next: ProjectStatus) -> bool {
        use ProjectStatus::*;
        matches!(
            (self, next),
            (Draft, Archived) | (Draft, Published) | (Archived, Draft) | (Published, Draft)
        )
    }
}

/// Boolean project fields addressable by the bulk engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFlag {
    Deleted,
    Pinned,
    Favorite,
    Shared,
}

impl ProjectFlag {
    /// Resolve a bulk-update action name to the flag it targets.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "delete" => Some(ProjectFlag::Deleted),
            "pinned" => Some(ProjectFlag::Pinned),
            "favorite" => Some(ProjectFlag::Favorite),
            "shared" => Some(ProjectFlag::Shared),
            _ => None,
        }
    }

    pub fn apply(self, project: &mut ProjectRecord, value: bool) {
        match self {
            ProjectFlag::Deleted => project.is_deleted = value,
            ProjectFlag::Pinned => project.is_pinned = value,
            ProjectFlag::Favorite => project.is_favorite = value,
            ProjectFlag::Shared => project.is_shared = value,
        }
    }

    pub fn get(self, project: &ProjectRecord) -> bool {
        match self {
            ProjectFlag::Deleted => project.is_deleted,
            ProjectFlag::Pinned => project.is_pinned,
            ProjectFlag::Favorite => project.is_favorite,
            ProjectFlag::Shared => project.is_shared,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Parse,
    Embed,
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

/// A user record stored in redb. Credentials are opaque here; password and
/// OAuth verification happen in the session layer upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A file record stored in redb. The raw bytes live in the object store under
/// `file_path`; this row is the metadata and lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    /// Unique, immutable once set.
    pub slug: String,
    pub file_name: String,
    pub file_extension: String,
    /// MIME type as detected at upload.
    pub file_type: String,
    pub file_size: u64,
    /// Object-store key, stable for the lifetime of the record.
    pub file_path: String,
    /// Retrieval URL from the storage backend. None for local storage, where
    /// downloads are streamed by this service instead.
    #[serde(default)]
    pub file_url: Option<String>,
    /// SHA-256 of the uploaded bytes, hex-encoded.
    pub file_hash: String,
    pub file_status: FileStatus,
    #[serde(default)]
    pub file_metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub file_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project record stored in redb. Deletion is a soft flag; rows are never
/// removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub owner_id: String,
    /// Unique, immutable once set.
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit of asynchronous work, mutated out-of-band by the worker executing
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    #[serde(default)]
    pub file_id: Option<String>,
    pub job_type: JobType,
    pub status: JobStatus,
    /// 0-100
    pub progress: f32,
    #[serde(default)]
    pub error_msg: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}
