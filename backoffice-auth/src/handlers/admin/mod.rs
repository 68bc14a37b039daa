pub mod users;

pub use users::{create_user, list_users, set_user_status};
