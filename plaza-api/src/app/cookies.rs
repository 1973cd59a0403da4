//! Session and forwarding-url cookies.

use axum::http::{header, HeaderMap};

/// Holds the session token.
pub const SESSION_COOKIE: &str = "session";
/// Remembers where a logged-out GET wanted to go, for one post-login redirect.
pub const FORWARDING_COOKIE: &str = "forwarding_url";

/// Reads a cookie value from the `Cookie` header(s).
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

pub fn set_cookie(name: &str, value: &str, max_age: Option<i64>, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, value);
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}

/// Cookie remembering `path` for the post-login redirect.
pub fn forwarding_cookie(path: &str) -> String {
    set_cookie(FORWARDING_COOKIE, &urlencoding::encode(path), None, false)
}

/// The remembered destination, if it is a local path.
pub fn read_forwarding_url(headers: &HeaderMap) -> Option<String> {
    let raw = read_cookie(headers, FORWARDING_COOKIE)?;
    let path = urlencoding::decode(&raw).ok()?.into_owned();
    // only same-site paths; "//host" would leave the site
    (path.starts_with('/') && !path.starts_with("//")).then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def; other=1"),
        );
        assert_eq!(read_cookie(&headers, SESSION_COOKIE).as_deref(), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn forwarding_url_round_trips_local_paths_only() {
        let mut headers = HeaderMap::new();
        let cookie = forwarding_cookie("/users?page=2");
        let pair = cookie.split(';').next().unwrap().to_string();
        headers.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
        assert_eq!(read_forwarding_url(&headers).as_deref(), Some("/users?page=2"));

        let mut headers = HeaderMap::new();
        let cookie = forwarding_cookie("//evil.example/");
        let pair = cookie.split(';').next().unwrap().to_string();
        headers.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
        assert_eq!(read_forwarding_url(&headers), None);
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        assert!(clear_cookie(SESSION_COOKIE).contains("Max-Age=0"));
        assert!(set_cookie(SESSION_COOKIE, "t", Some(60), true).ends_with("; Secure"));
    }
}
