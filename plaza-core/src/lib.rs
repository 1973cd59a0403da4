//! Core library for user accounts: validation, password authentication, sessions and a file-backed store.

mod error;
pub mod pagination;
pub mod user;

pub use error::{Result, ServiceError};
pub use pagination::Page;
pub use user::{
    policy, EditForm, Field, Identity, LoginRequest, RegisterRequest, Session, UpdateUserRequest,
    User, UserManager, UserSummary, Violations,
};
