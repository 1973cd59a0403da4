//! User listing, profiles, edits and admin deletes.

use super::output::print_json;
use super::prompt;
use super::ui::{
    format_role, print_empty, print_header, print_hint, print_info, print_kv, print_success,
    print_table_header, print_table_row,
};
use super::OutputFormat;
use crate::client::{expect_redirect, handle_error};
use plaza_core::{EditForm, Page, UpdateUserRequest, UserSummary};
use reqwest::Client;

/// Lists one page of users.
pub async fn list_users(
    client: &Client,
    base: &str,
    page: usize,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let resp = client
        .get(format!("{}/users", base))
        .query(&[("page", page)])
        .send()
        .await?;
    let page: Page<UserSummary> = handle_error(resp).await?.json().await?;

    match output {
        OutputFormat::Json => print_json(&page)?,
        OutputFormat::Table => {
            print_header("All users");
            if page.items.is_empty() {
                print_empty("No users on this page");
            } else {
                let columns = [("ID", 8), ("NAME", 24), ("EMAIL", 32), ("ROLE", 8)];
                print_table_header(&columns);
                for user in &page.items {
                    let id = user.id.to_string();
                    // plain text: escape codes would break column widths
                    let role = if user.admin { "admin" } else { "member" };
                    print_table_row(&[
                        (id.as_str(), 8),
                        (user.name.as_str(), 24),
                        (user.email.as_str(), 32),
                        (role, 8),
                    ]);
                }
                println!();
            }
            print_info(&format!(
                "page {} of {} ({} users)",
                page.page,
                page.total_pages.max(1),
                page.total
            ));
            if page.page < page.total_pages {
                print_hint(&format!("next: plaza-cli users list --page {}", page.page + 1));
            }
        }
    }
    Ok(())
}

pub async fn show_user(
    client: &Client,
    base: &str,
    id: u64,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let resp = client.get(format!("{}/users/{}", base, id)).send().await?;
    let user: UserSummary = handle_error(resp).await?.json().await?;

    match output {
        OutputFormat::Json => print_json(&user)?,
        OutputFormat::Table => {
            print_header(&user.name);
            print_kv("ID", &user.id.to_string());
            print_kv("Email", &user.email);
            print_kv("Role", &format_role(user.admin));
            if let Some(created) = user.created_at {
                print_kv("Joined", &created.format("%Y-%m-%d %H:%M").to_string());
            }
            println!();
        }
    }
    Ok(())
}

/// Fetches the prefilled edit form (owner only).
pub async fn edit_user(
    client: &Client,
    base: &str,
    id: u64,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let resp = client
        .get(format!("{}/users/{}/edit", base, id))
        .send()
        .await?;
    let form: EditForm = handle_error(resp).await?.json().await?;

    match output {
        OutputFormat::Json => print_json(&form)?,
        OutputFormat::Table => {
            print_header("Edit profile");
            print_kv("Name", &form.name);
            print_kv("Email", &form.email);
            print_hint(&format!(
                "plaza-cli users update {} --name <name> --email <email> [--password]",
                form.id
            ));
        }
    }
    Ok(())
}

pub async fn update_user(
    client: &Client,
    base: &str,
    id: u64,
    name: Option<String>,
    email: Option<String>,
    change_password: bool,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let mut form = UpdateUserRequest {
        name,
        email,
        ..Default::default()
    };
    if change_password {
        let (password, confirmation) = prompt::password_pair("New password")?;
        form.password = Some(password);
        form.password_confirmation = Some(confirmation);
    }

    let resp = client
        .patch(format!("{}/users/{}", base, id))
        .json(&form)
        .send()
        .await?;
    let redirected = expect_redirect(resp, "/users/").await?;

    match output {
        OutputFormat::Json => print_json(&redirected.body)?,
        OutputFormat::Table => print_success(redirected.flash().unwrap_or("Profile updated")),
    }
    Ok(())
}

/// Deletes a user (admin only), asking first unless `yes`.
pub async fn delete_user(client: &Client, base: &str, id: u64, yes: bool) -> anyhow::Result<()> {
    if !yes && !prompt::confirm(&format!("Delete user {}?", id))? {
        print_info("Cancelled");
        return Ok(());
    }
    let resp = client
        .delete(format!("{}/users/{}", base, id))
        .send()
        .await?;
    let redirected = expect_redirect(resp, "/users").await?;
    print_success(redirected.flash().unwrap_or("User deleted"));
    Ok(())
}
