use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_user, delete_user, edit_user, get_user, handler_404, health, list_users, login, logout,
    new_session, new_user, update_user,
};
use super::middleware::session_middleware;
use super::state::AppState;

/// Builds the CORS layer from the configured origins.
fn build_cors_layer(cors_origins: Vec<String>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .expose_headers([header::LOCATION]);

    if cors_origins.is_empty() {
        tracing::warn!(
            "PLAZA_CORS_ORIGINS not configured, allowing all origins. \
             Set PLAZA_CORS_ORIGINS in production."
        );
        // any() cannot be combined with credentials
        base.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .into_iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        base.allow_origin(origins).allow_credentials(true)
    }
}

/// Build the router with routes and middleware wired.
pub fn app_router(state: AppState, cors_origins: Vec<String>) -> Router {
    // Gates live in the extractors each handler takes (CurrentUser, RequireOwner, RequireAdmin)
    let user_routes = Router::new()
        .route("/signup", get(new_user))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user)
                .patch(update_user)
                .put(update_user)
                .delete(delete_user),
        )
        .route("/users/:id/edit", get(edit_user));

    let session_routes = Router::new()
        .route("/login", get(new_session).post(login))
        .route("/logout", delete(logout));

    Router::new()
        .route("/health", get(health))
        .merge(user_routes)
        .merge(session_routes)
        .fallback(handler_404)
        .layer(from_fn_with_state(state.clone(), session_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}
