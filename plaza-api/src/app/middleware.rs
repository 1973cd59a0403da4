use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use axum::body::Body;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use plaza_core::{policy, Identity};

use super::cookies::{read_cookie, SESSION_COOKIE};
use super::error::ApiError;
use super::state::AppState;

/// Acting user attached to the request by [`session_middleware`].
#[derive(Debug, Clone)]
pub struct AuthInfo {
	pub identity: Identity,
}

/// Rejection for a request without a session. GET requests remember their
/// path for the post-login redirect.
fn login_required(parts: &Parts) -> ApiError {
	if parts.method == Method::GET {
		let path = parts
			.uri
			.path_and_query()
			.map(|pq| pq.as_str())
			.unwrap_or_else(|| parts.uri.path());
		ApiError::login_required(Some(path))
	} else {
		ApiError::login_required(None)
	}
}

fn auth_info(parts: &Parts) -> Result<AuthInfo, ApiError> {
	parts
		.extensions
		.get::<AuthInfo>()
		.cloned()
		.ok_or_else(|| login_required(parts))
}

/// Requires a logged-in user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		_state: &'b S,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move {
			let auth = auth_info(parts)?;
			Ok(CurrentUser(auth.identity))
		})
	}
}

/// Requires a logged-in administrator
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for RequireAdmin {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		_state: &'b S,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move {
			let auth = auth_info(parts)?;
			if !policy::can_delete(&auth.identity) {
				tracing::warn!(user_id = auth.identity.id, path = %parts.uri.path(), "admin gate denied");
				return Err(ApiError::denied());
			}
			Ok(RequireAdmin(auth.identity))
		})
	}
}

/// The `:id` path segment; anything that is not a user id is a 404
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub u64);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		state: &'b S,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move {
			let Path(id) = Path::<u64>::from_request_parts(parts, state)
				.await
				.map_err(|_| ApiError::not_found("user not found"))?;
			Ok(UserId(id))
		})
	}
}

/// Requires the logged-in user to be the one named by the `:id` path segment
#[derive(Debug, Clone)]
pub struct RequireOwner {
	pub user_id: u64,
}

impl<S: Send + Sync> FromRequestParts<S> for RequireOwner {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		state: &'b S,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move {
			let auth = auth_info(parts)?;

			let UserId(user_id) = UserId::from_request_parts(parts, state).await?;

			if !policy::can_edit(&auth.identity, user_id) {
				tracing::warn!(user_id = auth.identity.id, target = user_id, "owner gate denied");
				return Err(ApiError::denied());
			}
			Ok(RequireOwner { user_id })
		})
	}
}

/// Session token from `Authorization: Bearer`, falling back to the session cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
	if let Some(token) = headers
		.get(axum::http::header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
	{
		return Some(token.to_string());
	}
	read_cookie(headers, SESSION_COOKIE)
}

/// Client IP for rate limiting.
/// Order: X-Real-IP > first X-Forwarded-For > socket address
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
	if let Some(real_ip) = headers.get("X-Real-IP").and_then(|v| v.to_str().ok()) {
		return real_ip.to_string();
	}

	if let Some(forwarded) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
		if let Some(first_ip) = forwarded.split(',').next().map(|s| s.trim()) {
			if !first_ip.is_empty() {
				return first_ip.to_string();
			}
		}
	}

	peer.map(|addr| addr.ip().to_string())
		.unwrap_or_else(|| "unknown".to_string())
}

/// Resolves the acting user from the session token, if any. Never rejects:
/// the gate extractors decide what needs a login.
pub async fn session_middleware(
	State(state): State<AppState>,
	mut request: Request<Body>,
	next: Next,
) -> Response {
	if let Some(token) = extract_token(request.headers()) {
		match state.user_manager.verify_session(&token).await {
			Ok(identity) => {
				request.extensions_mut().insert(AuthInfo { identity });
			}
			Err(e) => {
				tracing::debug!(error = %e, "ignoring invalid session token");
			}
		}
	}
	next.run(request).await
}
