//! Services layer for backoffice-auth.
//!
//! Credential storage, password recovery, sessions and account management.

mod accounts;
mod database;
mod email;
pub mod error;
mod recovery;
mod session;
mod sms;
mod store;

pub use accounts::{AccountService, LoginOutcome, NewUser};
pub use database::Database;
pub use email::{EmailProvider, EmailService, MockEmailService, SentEmail};
pub use error::{ServiceError, INVALID_RESET_CREDENTIAL};
pub use recovery::{check_password_strength, RecoveryService, ResetSubmission};
pub use session::{Session, SessionClaims, SessionService};
pub use sms::{HttpSmsService, MockSmsService, SentSms, SmsProvider};
pub use store::{CredentialStore, InMemoryCredentialStore};
