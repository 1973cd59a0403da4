use reqwest::header::{HeaderMap, AUTHORIZATION, LOCATION};
use reqwest::{redirect, StatusCode};
use serde_json::{json, Value};

/// Build an HTTP client with optional Bearer token default header.
///
/// Redirects are not followed: the API answers most writes with `303 See Other`
/// and the JSON body of that response is what the CLI reports.
pub fn build_client(token: &Option<String>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().redirect(redirect::Policy::none());
    if let Some(tok) = token {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {}", tok).parse()?);
        builder = builder.default_headers(headers);
    }
    Ok(builder.build()?)
}

/// A `303` answer: where the API sent us and what it said.
#[derive(Debug)]
pub struct Redirected {
    pub location: String,
    pub body: Value,
}

impl Redirected {
    pub fn flash(&self) -> Option<&str> {
        self.body["flash"]["message"].as_str()
    }
}

/// Turns a response into an error message, listing field violations when present.
async fn describe_failure(resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let body: Value = resp
        .json()
        .await
        .unwrap_or_else(|_| json!({"message": "unknown error"}));
    let message = body["message"].as_str().unwrap_or("request failed");
    let mut lines = vec![format!("{} ({})", message, status)];
    if let Some(errors) = body["errors"].as_object() {
        for (field, messages) in errors {
            for msg in messages.as_array().into_iter().flatten() {
                lines.push(format!("  {} {}", field, msg.as_str().unwrap_or_default()));
            }
        }
    }
    anyhow::anyhow!(lines.join("\n"))
}

/// Normalize non-2xx responses into errors while returning the response on success.
pub async fn handle_error(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    if resp.status() == StatusCode::SEE_OTHER {
        let redirected = read_redirect(resp).await?;
        return Err(denial(&redirected));
    }
    Err(describe_failure(resp).await)
}

async fn read_redirect(resp: reqwest::Response) -> anyhow::Result<Redirected> {
    let location = resp
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("/")
        .to_string();
    let body = resp.json().await.unwrap_or(Value::Null);
    Ok(Redirected { location, body })
}

fn denial(redirected: &Redirected) -> anyhow::Error {
    if redirected.location == "/login" {
        anyhow::anyhow!("please log in first (set PLAZA_TOKEN or pass --token)")
    } else {
        anyhow::anyhow!("not permitted")
    }
}

/// Expects a `303` whose target starts with `prefix`; other targets are gate denials.
pub async fn expect_redirect(
    resp: reqwest::Response,
    prefix: &str,
) -> anyhow::Result<Redirected> {
    if resp.status() != StatusCode::SEE_OTHER {
        return Err(describe_failure(resp).await);
    }
    let redirected = read_redirect(resp).await?;
    if redirected.location.starts_with(prefix) && redirected.location != "/login" {
        Ok(redirected)
    } else {
        Err(denial(&redirected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_reads_as_login_hint() {
        let redirected = Redirected {
            location: "/login".into(),
            body: json!({"flash": {"kind": "danger", "message": "Please log in."}}),
        };
        assert_eq!(redirected.flash(), Some("Please log in."));
        assert!(denial(&redirected).to_string().contains("log in"));
    }

    #[test]
    fn root_redirect_is_not_permitted() {
        let redirected = Redirected {
            location: "/".into(),
            body: json!({"redirect_to": "/"}),
        };
        assert_eq!(redirected.flash(), None);
        assert_eq!(denial(&redirected).to_string(), "not permitted");
    }
}
