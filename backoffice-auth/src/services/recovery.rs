//! Password recovery: issue a reset credential over email or SMS and consume
//! it exactly once.

use chrono::{Duration, Utc};
use std::sync::Arc;

use super::email::EmailProvider;
use super::error::ServiceError;
use super::sms::SmsProvider;
use super::store::CredentialStore;
use crate::config::ResetConfig;
use crate::models::{CredentialKind, IssuedCredential, PresentedCredential, ResetChannel};
use crate::utils::{hash_password, Password};

/// What the caller submitted to finish a reset.
#[derive(Debug)]
pub struct ResetSubmission {
    pub token: Option<String>,
    pub otp: Option<String>,
    pub identifier: Option<String>,
    pub new_password: Password,
}

impl ResetSubmission {
    /// A token wins over an OTP when both are present.
    fn presented(&self) -> Option<PresentedCredential> {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(token) = non_empty(&self.token) {
            return Some(PresentedCredential::token(&token));
        }
        match (non_empty(&self.otp), non_empty(&self.identifier)) {
            (Some(otp), Some(phone)) => Some(PresentedCredential::otp(&otp, &phone)),
            _ => None,
        }
    }
}

/// Reject passwords shorter than `min_length` characters.
pub fn check_password_strength(password: &Password, min_length: usize) -> Result<(), ServiceError> {
    if password.char_len() < min_length {
        return Err(ServiceError::WeakPassword(min_length));
    }
    Ok(())
}

#[derive(Clone)]
pub struct RecoveryService {
    store: Arc<dyn CredentialStore>,
    email: Arc<dyn EmailProvider>,
    sms: Arc<dyn SmsProvider>,
    ttl: Duration,
    password_min_length: usize,
    otp_max_attempts: u32,
}

impl RecoveryService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        email: Arc<dyn EmailProvider>,
        sms: Arc<dyn SmsProvider>,
        config: &ResetConfig,
    ) -> Self {
        Self {
            store,
            email,
            sms,
            ttl: Duration::minutes(config.credential_ttl_minutes),
            password_min_length: config.password_min_length,
            otp_max_attempts: config.otp_max_attempts,
        }
    }

    /// Issue a reset credential for the active user owning `identifier`.
    ///
    /// Succeeds whether or not such a user exists, and does the same work
    /// either way: one credential generated, one store write. The
    /// notification is sent from a background task after the credential is
    /// stored, so delivery failures never reach the caller.
    pub async fn request_reset(
        &self,
        channel: ResetChannel,
        identifier: &str,
    ) -> Result<(), ServiceError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ServiceError::ValidationError(
                "Identifier is required".to_string(),
            ));
        }

        let credential =
            IssuedCredential::generate(CredentialKind::from(channel), Utc::now(), self.ttl);

        let user = match self
            .store
            .issue_credential(channel, identifier, &credential)
            .await?
        {
            Some(user) => user,
            None => {
                tracing::info!(channel = channel.as_str(), "Password reset requested for unknown identifier");
                return Ok(());
            }
        };

        tracing::info!(
            user_id = %user.user_id,
            channel = channel.as_str(),
            expires_at = %credential.expires_at,
            "Password reset credential issued"
        );

        let user_id = user.user_id;
        match channel {
            ResetChannel::Email => {
                let email = self.email.clone();
                let to = user.email.clone();
                tokio::spawn(async move {
                    if let Err(e) = email.send_password_reset_email(&to, credential.secret()).await {
                        tracing::warn!(user_id = %user_id, error = %e, "Failed to deliver reset email");
                    }
                });
            }
            ResetChannel::Phone => {
                let sms = self.sms.clone();
                // The lookup matched on phone, so the identifier is the number.
                let to = user.phone.clone().unwrap_or_else(|| identifier.to_string());
                tokio::spawn(async move {
                    if let Err(e) = sms.send_reset_code(&to, credential.secret()).await {
                        tracing::warn!(user_id = %user_id, error = %e, "Failed to deliver reset SMS");
                    }
                });
            }
        }

        Ok(())
    }

    /// Validate the submitted credential and set the new password in one
    /// store write. Every mismatch is `InvalidResetCredential`.
    pub async fn consume_reset(&self, submission: ResetSubmission) -> Result<(), ServiceError> {
        check_password_strength(&submission.new_password, self.password_min_length)?;

        let presented = submission.presented().ok_or_else(|| {
            ServiceError::ValidationError(
                "Provide a token, or an otp together with the phone identifier".to_string(),
            )
        })?;

        let new_hash = hash_password(&submission.new_password)?;

        match self
            .store
            .consume_credential(
                &presented,
                new_hash.as_str(),
                Utc::now(),
                self.otp_max_attempts,
            )
            .await?
        {
            Some(user_id) => {
                tracing::info!(
                    user_id = %user_id,
                    kind = ?presented.kind(),
                    "Password reset completed"
                );
                Ok(())
            }
            None => {
                tracing::info!(kind = ?presented.kind(), "Password reset rejected");
                Err(ServiceError::InvalidResetCredential)
            }
        }
    }
}
