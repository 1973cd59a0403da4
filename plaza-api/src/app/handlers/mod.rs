mod health;
mod sessions;
mod users;

pub use health::{handler_404, health};
pub use sessions::{login, logout, new_session};
pub use users::{create_user, delete_user, edit_user, get_user, list_users, new_user, update_user};
