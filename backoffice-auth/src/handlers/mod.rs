//! HTTP handlers for backoffice-auth.

pub mod admin;
pub mod auth;
pub mod user;
