pub mod password;
pub mod session;

pub use password::{forgot_password, reset_password};
pub use session::login;
