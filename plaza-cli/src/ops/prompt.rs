//! Interactive prompts for values not given on the command line.

use dialoguer::{theme::ColorfulTheme, Confirm, Password};

/// Asks for a password and its confirmation.
///
/// Both answers are sent as typed so the server reports a mismatch the same
/// way it does for any other client.
pub fn password_pair(prompt: &str) -> anyhow::Result<(String, String)> {
    let theme = ColorfulTheme::default();
    let password = Password::with_theme(&theme)
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?;
    let confirmation = Password::with_theme(&theme)
        .with_prompt("Confirmation")
        .allow_empty_password(true)
        .interact()?;
    Ok((password, confirmation))
}

pub fn password(prompt: &str) -> anyhow::Result<String> {
    Ok(Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact()?)
}

pub fn confirm(prompt: &str) -> anyhow::Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
