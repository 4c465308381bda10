use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppJson, Identity, JSend};
use crate::storage::models::UserRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub bio: Option<String>,
    pub created_at: String,
    pub email: String,
    pub id: String,
    pub preferred_language: Option<String>,
    pub updated_at: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create the user for an email, or return the existing one. This is the
/// entry point for both classic registration and the first login through an
/// OAuth provider; credential verification happens upstream.
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<Json<JSend<UserResponse>>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("a valid email is required"));
    }

    let user = state
        .db
        .get_or_create_user_by_email(email, req.username.as_deref())?;

    tracing::debug!(user_id = %user.id, "Registered user");
    Ok(JSend::success(user_to_response(&user)))
}

pub async fn current_user(
    State(state): State<Arc<AppState>>,
    Identity(owner_id): Identity,
) -> Result<Json<JSend<UserResponse>>, ApiError> {
    let user = state
        .db
        .get_user(&owner_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(JSend::success(user_to_response(&user)))
}

// ============================================================================
// Helpers
// ============================================================================

fn user_to_response(user: &UserRecord) -> UserResponse {
    UserResponse {
        bio: user.bio.clone(),
        created_at: user.created_at.to_rfc3339(),
        email: user.email.clone(),
        id: user.id.clone(),
        preferred_language: user.preferred_language.clone(),
        updated_at: user.updated_at.to_rfc3339(),
        username: user.username.clone(),
    }
}
