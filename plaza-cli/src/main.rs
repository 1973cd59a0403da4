mod client;
mod ops;

use clap::{Parser, Subcommand};
use ops::{
    delete_user, edit_user, list_users, login, logout, show_user, signup, update_user,
    OutputFormat,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI wrapper around the Plaza HTTP API.
#[derive(Parser)]
#[command(name = "plaza-cli", author, version, about = "CLI for the Plaza accounts API")]
struct Cli {
    /// API base url
    #[arg(long, env = "PLAZA_API_BASE", default_value = "http://127.0.0.1:8080")]
    api_base: String,

    /// Session token (printed by `signup` and `login`)
    #[arg(long, env = "PLAZA_TOKEN")]
    token: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account (prompts for the password when not given)
    Signup {
        #[arg(long, short)]
        name: String,
        #[arg(long, short)]
        email: String,
        #[arg(long, short)]
        password: Option<String>,
    },
    /// Log in and print a session token
    Login {
        #[arg(long, short)]
        email: String,
        #[arg(long, short)]
        password: Option<String>,
    },
    /// End every session of the current user
    Logout,

    /// Browse and manage accounts
    #[command(subcommand)]
    Users(UserCommands),
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users, one page at a time
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show a profile
    Show { id: u64 },
    /// Show the edit form of your own profile
    Edit { id: u64 },
    /// Update your own profile
    Update {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        password: bool,
    },
    /// Delete a user (admin only)
    Delete {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();
    let client = client::build_client(&cli.token)?;
    tracing::debug!(api_base = %cli.api_base, "using API");

    match cli.command {
        Commands::Signup {
            name,
            email,
            password,
        } => signup(&client, &cli.api_base, name, email, password, cli.output).await?,
        Commands::Login { email, password } => {
            login(&client, &cli.api_base, email, password, cli.output).await?
        }
        Commands::Logout => logout(&client, &cli.api_base).await?,

        Commands::Users(user_cmd) => match user_cmd {
            UserCommands::List { page } => {
                list_users(&client, &cli.api_base, page, cli.output).await?
            }
            UserCommands::Show { id } => show_user(&client, &cli.api_base, id, cli.output).await?,
            UserCommands::Edit { id } => edit_user(&client, &cli.api_base, id, cli.output).await?,
            UserCommands::Update {
                id,
                name,
                email,
                password,
            } => {
                update_user(
                    &client,
                    &cli.api_base,
                    id,
                    name,
                    email,
                    password,
                    cli.output,
                )
                .await?
            }
            UserCommands::Delete { id, yes } => {
                delete_user(&client, &cli.api_base, id, yes).await?
            }
        },
    }

    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses() {
        let cli = Cli::parse_from(["plaza-cli", "users", "list", "--page", "3"]);
        assert!(matches!(
            cli.command,
            Commands::Users(UserCommands::List { page: 3 })
        ));
    }

    #[test]
    fn update_password_is_a_flag() {
        let cli = Cli::parse_from(["plaza-cli", "users", "update", "7", "--password"]);
        match cli.command {
            Commands::Users(UserCommands::Update {
                id, password, name, ..
            }) => {
                assert_eq!(id, 7);
                assert!(password);
                assert!(name.is_none());
            }
            _ => panic!("expected users update"),
        }
    }

    #[test]
    fn rejects_non_numeric_ids() {
        assert!(Cli::try_parse_from(["plaza-cli", "users", "show", "abc"]).is_err());
    }
}
