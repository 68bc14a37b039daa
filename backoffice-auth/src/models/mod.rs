//! Domain models for backoffice-auth.

pub mod reset_credential;
pub mod role;
pub mod user;

pub use reset_credential::{
    CredentialKind, IssuedCredential, PresentedCredential, ResetChannel,
};
pub use role::{Role, UnknownRole};
pub use user::{User, UserResponse};
