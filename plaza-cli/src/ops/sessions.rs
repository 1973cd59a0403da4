//! Signup, login and logout.

use super::output::print_json;
use super::prompt;
use super::ui::{print_header, print_hint, print_info, print_kv, print_section, print_success};
use super::OutputFormat;
use crate::client::expect_redirect;
use crossterm::style::Stylize;
use plaza_core::{LoginRequest, RegisterRequest, Session};
use reqwest::Client;

fn print_session(session: &Session, title: &str) {
    print_header(title);
    print_kv("ID", &session.user.id.to_string());
    print_kv("Name", &session.user.name);
    print_kv("Email", &session.user.email);
    print_kv("Token", &session.token);
    print_kv("Expires In", &format!("{} seconds", session.expires_in));
    print_section("Next");
    print_hint(&format!(
        "export {} to use this session",
        "PLAZA_TOKEN=<token>".cyan()
    ));
}

fn session_from(body: &serde_json::Value) -> anyhow::Result<Session> {
    Ok(serde_json::from_value(body["session"].clone())?)
}

/// Registers an account; the API logs the new user straight in.
pub async fn signup(
    client: &Client,
    base: &str,
    name: String,
    email: String,
    password: Option<String>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let (password, password_confirmation) = match password {
        Some(p) => (p.clone(), p),
        None => prompt::password_pair("Password")?,
    };
    let form = RegisterRequest {
        name,
        email,
        password,
        password_confirmation,
    };

    let resp = client
        .post(format!("{}/users", base))
        .json(&form)
        .send()
        .await?;
    let redirected = expect_redirect(resp, "/users/").await?;
    let session = session_from(&redirected.body)?;

    match output {
        OutputFormat::Json => print_json(&session)?,
        OutputFormat::Table => {
            if let Some(flash) = redirected.flash() {
                print_success(flash);
            }
            print_session(&session, "Account created");
        }
    }
    Ok(())
}

pub async fn login(
    client: &Client,
    base: &str,
    email: String,
    password: Option<String>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt::password("Password")?,
    };
    let resp = client
        .post(format!("{}/login", base))
        .json(&LoginRequest { email, password })
        .send()
        .await?;
    let redirected = expect_redirect(resp, "/").await?;
    let session = session_from(&redirected.body)?;

    match output {
        OutputFormat::Json => print_json(&session)?,
        OutputFormat::Table => print_session(&session, "Logged in"),
    }
    Ok(())
}

/// Ends every session of the token's user.
pub async fn logout(client: &Client, base: &str) -> anyhow::Result<()> {
    let resp = client.delete(format!("{}/logout", base)).send().await?;
    let redirected = expect_redirect(resp, "/").await?;
    print_info(redirected.flash().unwrap_or("Logged out"));
    Ok(())
}
