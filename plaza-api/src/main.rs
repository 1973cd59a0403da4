mod app;

use app::{app_router, AppState, RateLimiter};
use dotenvy::dotenv;
use plaza_core::UserManager;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
struct AdminSeed {
    name: String,
    email: String,
    password: String,
}

#[derive(Debug, Clone)]
struct ApiConfig {
    bind: SocketAddr,
    data_dir: PathBuf,
    /// JWT signing secret for session tokens
    jwt_secret: String,
    jwt_issuer: String,
    jwt_audience: String,
    /// Session lifetime in seconds
    session_ttl: i64,
    per_page: usize,
    bcrypt_cost: u32,
    secure_cookies: bool,
    /// Allowed CORS origins (empty allows any)
    cors_origins: Vec<String>,
    admin_seed: Option<AdminSeed>,
}

const DEFAULT_SESSION_TTL: i64 = 24 * 3600;
/// One year; longer lifetimes are refused.
const MAX_SESSION_TTL: i64 = 365 * 24 * 3600;

/// Accepts 1..=MAX_SESSION_TTL seconds, falling back to the default otherwise.
fn session_ttl(configured: Option<i64>) -> i64 {
    match configured {
        Some(ttl) if (1..=MAX_SESSION_TTL).contains(&ttl) => ttl,
        Some(ttl) => {
            warn!(ttl, max = MAX_SESSION_TTL, "PLAZA_SESSION_TTL out of range, using default");
            DEFAULT_SESSION_TTL
        }
        None => DEFAULT_SESSION_TTL,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl ApiConfig {
    fn from_env() -> Self {
        let bind = env_parse("PLAZA_BIND")
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let data_dir = env::var("PLAZA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let jwt_secret = env_non_empty("PLAZA_JWT_SECRET").unwrap_or_else(|| {
            info!("PLAZA_JWT_SECRET not set; generating a random secret, sessions end on restart");
            uuid::Uuid::new_v4().to_string()
        });
        let jwt_issuer = env_non_empty("PLAZA_JWT_ISSUER").unwrap_or_else(|| "plaza-api".into());
        let jwt_audience =
            env_non_empty("PLAZA_JWT_AUDIENCE").unwrap_or_else(|| "plaza-clients".into());

        let session_ttl = session_ttl(env_parse("PLAZA_SESSION_TTL"));
        let per_page = env_parse("PLAZA_PER_PAGE")
            .filter(|n: &usize| *n > 0)
            .unwrap_or(plaza_core::pagination::DEFAULT_PER_PAGE);
        let bcrypt_cost = env_parse("PLAZA_BCRYPT_COST").unwrap_or(plaza_core::user::DEFAULT_HASH_COST);
        let secure_cookies = env_parse("PLAZA_SECURE_COOKIES").unwrap_or(false);

        // comma separated; empty or "*" allows any origin
        let cors_origins = env::var("PLAZA_CORS_ORIGINS")
            .ok()
            .map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "*" {
                    vec![]
                } else {
                    trimmed
                        .split(',')
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| t.trim().to_string())
                        .collect()
                }
            })
            .unwrap_or_default();

        let admin_seed = match (
            env_non_empty("PLAZA_ADMIN_NAME"),
            env_non_empty("PLAZA_ADMIN_EMAIL"),
            env_non_empty("PLAZA_ADMIN_PASSWORD"),
        ) {
            (Some(name), Some(email), Some(password)) => Some(AdminSeed {
                name,
                email,
                password,
            }),
            _ => None,
        };

        Self {
            bind,
            data_dir,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            session_ttl,
            per_page,
            bcrypt_cost,
            secure_cookies,
            cors_origins,
            admin_seed,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenv();
    init_tracing();

    let config = ApiConfig::from_env();
    info!("starting API on {}", config.bind);

    let user_manager = Arc::new(
        UserManager::new(config.data_dir.clone(), config.jwt_secret.clone())
            .with_claims_context(config.jwt_issuer.clone(), config.jwt_audience.clone())
            .with_session_ttl(config.session_ttl)
            .with_hash_cost(config.bcrypt_cost)
            .with_per_page(config.per_page),
    );
    user_manager.ensure_dirs()?;

    if let Some(seed) = &config.admin_seed {
        let admin = user_manager
            .ensure_admin(&seed.name, &seed.email, &seed.password)
            .await?;
        info!(user_id = admin.id, email = %admin.email, "admin account ready");
    }

    let state = AppState {
        user_manager,
        login_limiter: Arc::new(RateLimiter::new(10, Duration::from_secs(60))),
        secure_cookies: config.secure_cookies,
    };

    let app = app_router(state, config.cors_origins.clone());
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}
