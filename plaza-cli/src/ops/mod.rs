mod output;
mod prompt;
mod sessions;
mod ui;
mod users;

pub use output::OutputFormat;
pub use sessions::{login, logout, signup};
pub use users::{delete_user, edit_user, list_users, show_user, update_user};
