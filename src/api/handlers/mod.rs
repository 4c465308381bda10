mod admin;
mod files;
mod jobs;
mod projects;
mod users;

pub use admin::{admin_purge, health};
pub use files::{
    bulk_update_file_status, download_file, get_file, list_files, update_file_metadata,
    update_file_status, upload_file,
};
pub use jobs::{get_job, list_jobs};
pub use projects::{
    archive_project, archived_projects, attach_file, bulk_attach_files, bulk_create_projects,
    bulk_delete_projects, bulk_detach_files, bulk_update_projects, create_project, delete_project,
    detach_file, favorite_projects, get_project, list_project_files, list_projects,
    pinned_projects, publish_project, shared_projects, toggle_favorite, toggle_pin, toggle_share,
    unarchive_project, unpublish_project, update_project, update_project_status,
};
pub use users::{current_user, register_user};
