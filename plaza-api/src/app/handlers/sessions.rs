//! Login/logout handlers

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use plaza_core::LoginRequest;
use serde_json::{json, Value};
use std::net::SocketAddr;

use super::super::cookies::{
    clear_cookie, read_forwarding_url, set_cookie, FORWARDING_COOKIE, SESSION_COOKIE,
};
use super::super::error::ApiError;
use super::super::middleware::{extract_client_ip, AuthInfo};
use super::super::response::{FlashKind, Redirect};
use super::super::state::AppState;

/// GET /login - blank login form
pub async fn new_session() -> Json<Value> {
    Json(json!({
        "session": LoginRequest::default(),
    }))
}

/// POST /login - open a session, then go to the remembered page or the profile
pub async fn login(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Redirect, ApiError> {
    let ip = extract_client_ip(&headers, connect.map(|ConnectInfo(addr)| addr));
    if !state.login_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many login attempts, try again later",
        ));
    }

    let session = state.user_manager.login(&req.email, &req.password).await?;
    let target = read_forwarding_url(&headers)
        .unwrap_or_else(|| format!("/users/{}", session.user.id));

    let cookie = set_cookie(
        SESSION_COOKIE,
        &session.token,
        Some(session.expires_in),
        state.secure_cookies,
    );
    Ok(Redirect::to(target)
        .with("user", &session.user)
        .with("session", &session)
        .cookie(cookie)
        .cookie(clear_cookie(FORWARDING_COOKIE)))
}

/// DELETE /logout - revoke the caller's sessions and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    auth: Option<Extension<AuthInfo>>,
) -> Result<Redirect, ApiError> {
    if let Some(Extension(auth)) = auth {
        state.user_manager.logout(auth.identity.id).await?;
    }
    Ok(Redirect::to("/")
        .flash(FlashKind::Info, "Logged out")
        .cookie(clear_cookie(SESSION_COOKIE)))
}
