use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize;

    let mut router = Router::new()
        // Users
        .route("/users", post(handlers::register_user))
        .route("/users/me", get(handlers::current_user))
        // Files
        .route("/files", get(handlers::list_files))
        .route(
            "/files",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/bulk-status", post(handlers::bulk_update_file_status))
        .route("/files/:id", get(handlers::get_file))
        .route("/files/:id", put(handlers::update_file_metadata))
        .route("/files/:id/status", patch(handlers::update_file_status))
        .route("/files/:id/download", get(handlers::download_file))
        // Projects
        .route("/projects", get(handlers::list_projects))
        .route("/projects", post(handlers::create_project))
        .route("/projects/bulk-create", post(handlers::bulk_create_projects))
        .route("/projects/bulk-delete", post(handlers::bulk_delete_projects))
        .route("/projects/bulk-update", post(handlers::bulk_update_projects))
        .route("/projects/pinned", get(handlers::pinned_projects))
        .route("/projects/favorites", get(handlers::favorite_projects))
        .route("/projects/shared", get(handlers::shared_projects))
        .route("/projects/archived", get(handlers::archived_projects))
        .route("/projects/:id", get(handlers::get_project))
        .route("/projects/:id", put(handlers::update_project))
        .route("/projects/:id", delete(handlers::delete_project))
        .route("/projects/:id/toggle-pin", patch(handlers::toggle_pin))
        .route(
            "/projects/:id/toggle-favorite",
            patch(handlers::toggle_favorite),
        )
        .route("/projects/:id/toggle-share", patch(handlers::toggle_share))
        .route("/projects/:id/archive", patch(handlers::archive_project))
        .route("/projects/:id/unarchive", patch(handlers::unarchive_project))
        .route("/projects/:id/publish", patch(handlers::publish_project))
        .route("/projects/:id/unpublish", patch(handlers::unpublish_project))
        .route("/projects/:id/status", patch(handlers::update_project_status))
        .route("/projects/:id/files", get(handlers::list_project_files))
        .route(
            "/projects/:id/files/bulk-attach",
            post(handlers::bulk_attach_files),
        )
        .route(
            "/projects/:id/files/bulk-detach",
            post(handlers::bulk_detach_files),
        )
        .route("/projects/:id/files/:file_id", post(handlers::attach_file))
        .route(
            "/projects/:id/files/:file_id",
            delete(handlers::detach_file),
        )
        // Jobs
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/:id", get(handlers::get_job))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled — purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
