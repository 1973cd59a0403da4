//! Redirect responses carrying a flash message and JSON data.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Info,
    Danger,
}

#[derive(Debug, Clone, Serialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

/// `303 See Other` to `location`; the body repeats the target so JSON clients
/// that do not follow redirects can read it.
#[derive(Debug, Clone)]
pub struct Redirect {
    location: String,
    flash: Option<Flash>,
    data: Map<String, Value>,
    cookies: Vec<String>,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            flash: None,
            data: Map::new(),
            cookies: Vec::new(),
        }
    }

    pub fn flash(mut self, kind: FlashKind, message: impl Into<String>) -> Self {
        self.flash = Some(Flash {
            kind,
            message: message.into(),
        });
        self
    }

    /// Adds `key` to the body.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.to_string(), value);
        self
    }

    /// Adds a `Set-Cookie` header.
    pub fn cookie(mut self, cookie: String) -> Self {
        self.cookies.push(cookie);
        self
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let mut body = self.data;
        body.insert("redirect_to".into(), Value::String(self.location.clone()));
        if let Some(flash) = self.flash {
            body.insert(
                "flash".into(),
                serde_json::to_value(flash).unwrap_or(Value::Null),
            );
        }

        let mut response = (StatusCode::SEE_OTHER, Json(Value::Object(body))).into_response();
        let headers = response.headers_mut();
        if let Ok(location) = HeaderValue::from_str(&self.location) {
            headers.insert(header::LOCATION, location);
        }
        for cookie in self.cookies {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.append(header::SET_COOKIE, value);
            }
        }
        response
    }
}
