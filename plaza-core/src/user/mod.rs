//! User accounts: validation, authentication and authorization.

mod auth;
mod crypto;
mod manager;
mod models;
pub mod policy;
mod store;
mod validation;

pub use crypto::password_matches;
pub use manager::{UserManager, DEFAULT_HASH_COST, MIN_HASH_COST};
pub use models::{
    EditForm, Identity, LoginRequest, RegisterRequest, Session, SessionClaims, UpdateUserRequest,
    User, UserSummary,
};
pub use store::UserStore;
pub use validation::{
    is_valid_email, normalize_email, validate_fields, Field, PasswordChange, Violation, Violations,
};
