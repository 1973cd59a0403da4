//! User account handlers: signup, listing, profile, edit/update, delete.

use axum::extract::{Query, State};
use axum::Json;
use plaza_core::{EditForm, Page, RegisterRequest, UpdateUserRequest, UserSummary};
use serde::Deserialize;
use serde_json::{json, Value};

use super::super::cookies::{set_cookie, SESSION_COOKIE};
use super::super::error::ApiError;
use super::super::middleware::{CurrentUser, RequireAdmin, RequireOwner, UserId};
use super::super::response::{FlashKind, Redirect};
use super::super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

/// GET /signup - blank registration form
pub async fn new_user() -> Json<Value> {
    Json(json!({
        "user": RegisterRequest::default(),
    }))
}

/// POST /users - register and log in
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Redirect, ApiError> {
    let user = state.user_manager.register(req).await?;
    let session = state.user_manager.issue_session(&user)?;
    let cookie = set_cookie(
        SESSION_COOKIE,
        &session.token,
        Some(session.expires_in),
        state.secure_cookies,
    );
    Ok(Redirect::to(format!("/users/{}", user.id))
        .flash(FlashKind::Success, "Welcome to the Plaza Calendar!")
        .with("user", UserSummary::from(user))
        .with("session", session)
        .cookie(cookie))
}

/// GET /users?page=N - paginated listing
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<UserSummary>>, ApiError> {
    let page = state
        .user_manager
        .list_users(query.page.unwrap_or(1))
        .await?;
    Ok(Json(page))
}

/// GET /users/:id - profile
pub async fn get_user(
    State(state): State<AppState>,
    UserId(id): UserId,
) -> Result<Json<UserSummary>, ApiError> {
    let user = state.user_manager.get_user(id).await?;
    Ok(Json(user.into()))
}

/// GET /users/:id/edit - prefilled edit form (owner only)
pub async fn edit_user(
    State(state): State<AppState>,
    owner: RequireOwner,
) -> Result<Json<EditForm>, ApiError> {
    let user = state.user_manager.get_user(owner.user_id).await?;
    Ok(Json(user.into()))
}

/// PATCH /users/:id - update profile (owner only)
pub async fn update_user(
    State(state): State<AppState>,
    owner: RequireOwner,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Redirect, ApiError> {
    let user = state.user_manager.update_user(owner.user_id, req).await?;
    Ok(Redirect::to(format!("/users/{}", user.id))
        .flash(FlashKind::Success, "Profile updated")
        .with("user", UserSummary::from(user)))
}

/// DELETE /users/:id - remove a user (admin only)
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    UserId(id): UserId,
) -> Result<Redirect, ApiError> {
    state.user_manager.delete_user(id).await?;
    tracing::info!(admin_id = admin.id, user_id = id, "admin deleted user");
    Ok(Redirect::to("/users").flash(FlashKind::Success, "User deleted"))
}
