use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use plaza_core::{ServiceError, Violations};
use serde_json::json;

use super::cookies::forwarding_cookie;
use super::response::{FlashKind, Redirect};

/// Generic text for failed logins, whichever half was wrong.
pub const INVALID_CREDENTIALS: &str = "Invalid email/password combination";

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
    errors: Option<Violations>,
    /// Authorization denials are redirects rather than error bodies
    redirect: Option<Redirect>,
}

impl ApiError {
    pub fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
            errors: None,
            redirect: None,
        }
    }

    fn redirect(redirect: Redirect) -> Self {
        Self {
            redirect: Some(redirect),
            ..Self::new("Redirect", StatusCode::SEE_OTHER, "")
        }
    }

    /// Not logged in: send to the login form, remembering `return_to`.
    pub fn login_required(return_to: Option<&str>) -> Self {
        let mut redirect = Redirect::to("/login").flash(FlashKind::Danger, "Please log in.");
        if let Some(path) = return_to {
            redirect = redirect.cookie(forwarding_cookie(path));
        }
        Self::redirect(redirect)
    }

    /// Logged in but not allowed: back to the root without detail.
    pub fn denied() -> Self {
        Self::redirect(Redirect::to("/"))
    }

    pub fn invalid_credentials() -> Self {
        Self::new(
            "InvalidCredentials",
            StatusCode::UNAUTHORIZED,
            INVALID_CREDENTIALS,
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFound", StatusCode::NOT_FOUND, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("TooManyRequests", StatusCode::TOO_MANY_REQUESTS, message)
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "internal error");
        Self::new(
            "InternalError",
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error",
        )
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            ServiceError::AlreadyExists(what) => ApiError::new(
                "AlreadyExists",
                StatusCode::CONFLICT,
                format!("{what} already exists"),
            ),
            ServiceError::Validation(violations) => ApiError {
                errors: Some(violations.clone()),
                ..ApiError::new(
                    "ValidationFailed",
                    StatusCode::UNPROCESSABLE_ENTITY,
                    violations.to_string(),
                )
            },
            ServiceError::InvalidCredentials => ApiError::invalid_credentials(),
            ServiceError::Unauthorized(msg) => {
                ApiError::new("Unauthorized", StatusCode::UNAUTHORIZED, msg)
            }
            err @ (ServiceError::Io(_) | ServiceError::Serde(_) | ServiceError::Other(_)) => {
                ApiError::internal(err)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Some(redirect) = self.redirect {
            return redirect.into_response();
        }
        let mut body = json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(errors) = self.errors {
            body["errors"] = json!(errors);
        }
        (self.status, Json(body)).into_response()
    }
}
