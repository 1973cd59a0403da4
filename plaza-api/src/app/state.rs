use plaza_core::UserManager;
use std::sync::Arc;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub user_manager: Arc<UserManager>,
    /// Login attempts per client IP
    pub login_limiter: Arc<crate::app::RateLimiter>,
    /// Adds `Secure` to session cookies
    pub secure_cookies: bool,
}
