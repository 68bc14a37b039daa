//! Credential store seam.
//!
//! Every operation that touches reset columns is a single write so the
//! "one outstanding credential" and "one successful consumption" rules hold
//! without application-level locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Mutex;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::models::{CredentialKind, IssuedCredential, PresentedCredential, ResetChannel, User};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    /// Case-insensitive email lookup, active or not.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    /// Insert a user. A duplicate email is `AppError::Conflict`.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    /// Returns false when no such user exists.
    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, AppError>;

    /// Replace the password hash and drop any outstanding reset credential.
    /// Returns false when no such user exists.
    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str)
        -> Result<bool, AppError>;

    /// Write `credential` for the active user owning `identifier` on
    /// `channel`, clearing the other flow's columns and the OTP attempt count
    /// in the same write. Email matches case-insensitively, phone matches
    /// exactly. Returns the updated user, or `None` when nobody matched.
    async fn issue_credential(
        &self,
        channel: ResetChannel,
        identifier: &str,
        credential: &IssuedCredential,
    ) -> Result<Option<User>, AppError>;

    /// Match `presented` against an unexpired stored credential and, in the
    /// same write, set `new_password_hash` and clear every reset column.
    /// Returns the matched user id, or `None` for no match.
    ///
    /// A wrong OTP presented with the owner's phone counts against that
    /// code; once `max_otp_attempts` is reached the code no longer matches.
    async fn consume_credential(
        &self,
        presented: &PresentedCredential,
        new_password_hash: &str,
        now: DateTime<Utc>,
        max_otp_attempts: u32,
    ) -> Result<Option<Uuid>, AppError>;
}

/// In-process store guarded by a mutex. Used by tests and local runs without
/// PostgreSQL.
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, User>>, AppError> {
        self.users
            .lock()
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("In-memory store mutex poisoned: {}", e)))
    }
}

fn digests_match(stored: Option<&str>, presented: &str) -> bool {
    match stored {
        Some(stored) => stored.as_bytes().ct_eq(presented.as_bytes()).into(),
        None => false,
    }
}

fn clear_reset_artifacts(user: &mut User) {
    user.reset_token = None;
    user.reset_token_expires = None;
    user.otp_code = None;
    user.otp_expires = None;
    user.otp_attempts = 0;
}

fn apply_reset(user: &mut User, new_password_hash: &str, now: DateTime<Utc>) -> Uuid {
    user.password_hash = new_password_hash.to_string();
    clear_reset_artifacts(user);
    user.updated_utc = now;
    user.user_id
}

pub(crate) fn attempt_cap(max_otp_attempts: u32) -> i32 {
    i32::try_from(max_otp_attempts).unwrap_or(i32::MAX)
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()?
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.lock()?.values().cloned().collect();
        users.sort_by_key(|u| u.created_utc);
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.lock()?;
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict(anyhow::anyhow!("Email already registered")));
        }
        users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, AppError> {
        let mut users = self.lock()?;
        match users.get_mut(&user_id) {
            Some(user) => {
                user.is_active = active;
                user.updated_utc = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let mut users = self.lock()?;
        match users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                clear_reset_artifacts(user);
                user.updated_utc = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn issue_credential(
        &self,
        channel: ResetChannel,
        identifier: &str,
        credential: &IssuedCredential,
    ) -> Result<Option<User>, AppError> {
        let mut users = self.lock()?;
        let owner = users
            .values_mut()
            .filter(|u| u.is_active)
            .filter(|u| match channel {
                ResetChannel::Email => u.email.eq_ignore_ascii_case(identifier),
                ResetChannel::Phone => u.phone.as_deref() == Some(identifier),
            })
            .min_by_key(|u| u.created_utc);

        Ok(owner.map(|user| {
            clear_reset_artifacts(user);
            match credential.kind {
                CredentialKind::Token => {
                    user.reset_token = Some(credential.digest.clone());
                    user.reset_token_expires = Some(credential.expires_at);
                }
                CredentialKind::Otp => {
                    user.otp_code = Some(credential.digest.clone());
                    user.otp_expires = Some(credential.expires_at);
                }
            }
            user.updated_utc = Utc::now();
            user.clone()
        }))
    }

    async fn consume_credential(
        &self,
        presented: &PresentedCredential,
        new_password_hash: &str,
        now: DateTime<Utc>,
        max_otp_attempts: u32,
    ) -> Result<Option<Uuid>, AppError> {
        let mut users = self.lock()?;

        match presented {
            PresentedCredential::Token { digest } => Ok(users
                .values_mut()
                .filter(|u| u.is_active)
                .find(|u| {
                    digests_match(u.reset_token.as_deref(), digest)
                        && u.reset_token_expires.is_some_and(|exp| exp > now)
                })
                .map(|user| apply_reset(user, new_password_hash, now))),
            PresentedCredential::Otp { digest, phone } => {
                let cap = attempt_cap(max_otp_attempts);
                // Same row choice as the SQL store: a matching code first,
                // then the most recently issued one.
                let target = users
                    .values_mut()
                    .filter(|u| {
                        u.is_active
                            && u.phone.as_deref() == Some(phone.as_str())
                            && u.otp_code.is_some()
                            && u.otp_expires.is_some_and(|exp| exp > now)
                            && u.otp_attempts < cap
                    })
                    .max_by_key(|u| (digests_match(u.otp_code.as_deref(), digest), u.updated_utc));

                match target {
                    Some(user) if digests_match(user.otp_code.as_deref(), digest) => {
                        Ok(Some(apply_reset(user, new_password_hash, now)))
                    }
                    Some(user) => {
                        user.otp_attempts += 1;
                        if user.otp_attempts >= cap {
                            tracing::warn!(user_id = %user.user_id, "Reset code locked after too many wrong attempts");
                        }
                        Ok(None)
                    }
                    None => Ok(None),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Duration;

    const MAX_ATTEMPTS: u32 = 3;

    fn user(email: &str, phone: Option<&str>) -> User {
        User::new(
            email.to_string(),
            phone.map(str::to_string),
            "$argon2id$old".to_string(),
            Role::User,
        )
    }

    fn token_at(now: DateTime<Utc>) -> IssuedCredential {
        IssuedCredential::generate(CredentialKind::Token, now, Duration::minutes(15))
    }

    fn otp_at(now: DateTime<Utc>) -> IssuedCredential {
        IssuedCredential::generate(CredentialKind::Otp, now, Duration::minutes(15))
    }

    fn wrong_code(code: &str) -> String {
        if code == "100000" { "100001" } else { "100000" }.to_string()
    }

    #[tokio::test]
    async fn issue_matches_email_case_insensitively_and_skips_inactive() {
        let store = InMemoryCredentialStore::new();
        let active = user("Clerk@Shop.test", None);
        let mut inactive = user("gone@shop.test", None);
        inactive.is_active = false;
        store.insert_user(&active).await.unwrap();
        store.insert_user(&inactive).await.unwrap();
        let now = Utc::now();

        let issued = store
            .issue_credential(ResetChannel::Email, "clerk@shop.test", &token_at(now))
            .await
            .unwrap();
        assert_eq!(issued.map(|u| u.user_id), Some(active.user_id));

        let missing = store
            .issue_credential(ResetChannel::Email, "gone@shop.test", &token_at(now))
            .await
            .unwrap();
        assert!(missing.is_none());
        let stored = store.find_user_by_id(inactive.user_id).await.unwrap().unwrap();
        assert!(stored.has_no_reset_artifacts());
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let store = InMemoryCredentialStore::new();
        store.insert_user(&user("a@shop.test", None)).await.unwrap();
        let err = store.insert_user(&user("A@shop.test", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn issuing_otp_supersedes_pending_token() {
        let store = InMemoryCredentialStore::new();
        let u = user("a@shop.test", Some("+15551234567"));
        store.insert_user(&u).await.unwrap();
        let now = Utc::now();

        let token = token_at(now);
        store
            .issue_credential(ResetChannel::Email, "a@shop.test", &token)
            .await
            .unwrap();
        let otp = otp_at(now);
        store
            .issue_credential(ResetChannel::Phone, "+15551234567", &otp)
            .await
            .unwrap();

        let stored = store.find_user_by_id(u.user_id).await.unwrap().unwrap();
        assert!(stored.reset_token.is_none());
        assert!(stored.reset_token_expires.is_none());
        assert_eq!(stored.otp_code.as_deref(), Some(otp.digest.as_str()));

        let replay = store
            .consume_credential(&PresentedCredential::token(token.secret()), "$new", now, MAX_ATTEMPTS)
            .await
            .unwrap();
        assert!(replay.is_none());
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let store = InMemoryCredentialStore::new();
        let u = user("a@shop.test", None);
        store.insert_user(&u).await.unwrap();
        let now = Utc::now();
        let token = token_at(now);
        store
            .issue_credential(ResetChannel::Email, "a@shop.test", &token)
            .await
            .unwrap();

        let presented = PresentedCredential::token(token.secret());
        let first = store
            .consume_credential(&presented, "$new", now, MAX_ATTEMPTS)
            .await
            .unwrap();
        assert_eq!(first, Some(u.user_id));

        let second = store
            .consume_credential(&presented, "$newer", now, MAX_ATTEMPTS)
            .await
            .unwrap();
        assert!(second.is_none());

        let stored = store.find_user_by_id(u.user_id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$new");
        assert!(stored.has_no_reset_artifacts());
    }

    #[tokio::test]
    async fn expired_token_does_not_match() {
        let store = InMemoryCredentialStore::new();
        let u = user("a@shop.test", None);
        store.insert_user(&u).await.unwrap();
        let now = Utc::now();
        let token = token_at(now - Duration::minutes(20));
        store
            .issue_credential(ResetChannel::Email, "a@shop.test", &token)
            .await
            .unwrap();

        let result = store
            .consume_credential(&PresentedCredential::token(token.secret()), "$new", now, MAX_ATTEMPTS)
            .await
            .unwrap();
        assert!(result.is_none());

        // Expiry exactly at `now` is also rejected.
        let boundary = IssuedCredential::from_secret(
            CredentialKind::Token,
            "boundary".to_string(),
            now,
        );
        store
            .issue_credential(ResetChannel::Email, "a@shop.test", &boundary)
            .await
            .unwrap();
        let result = store
            .consume_credential(&PresentedCredential::token("boundary"), "$new", now, MAX_ATTEMPTS)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn otp_requires_matching_phone() {
        let store = InMemoryCredentialStore::new();
        let u = user("a@shop.test", Some("+15551234567"));
        store.insert_user(&u).await.unwrap();
        let now = Utc::now();
        let otp = otp_at(now);
        store
            .issue_credential(ResetChannel::Phone, "+15551234567", &otp)
            .await
            .unwrap();

        let wrong_phone = PresentedCredential::otp(otp.secret(), "+15559999999");
        assert!(store
            .consume_credential(&wrong_phone, "$new", now, MAX_ATTEMPTS)
            .await
            .unwrap()
            .is_none());
        let stored = store.find_user_by_id(u.user_id).await.unwrap().unwrap();
        assert_eq!(stored.otp_attempts, 0);

        let right_phone = PresentedCredential::otp(otp.secret(), "+15551234567");
        assert_eq!(
            store
                .consume_credential(&right_phone, "$new", now, MAX_ATTEMPTS)
                .await
                .unwrap(),
            Some(u.user_id)
        );
    }

    #[tokio::test]
    async fn wrong_codes_lock_the_otp() {
        let store = InMemoryCredentialStore::new();
        let u = user("a@shop.test", Some("+15551234567"));
        store.insert_user(&u).await.unwrap();
        let now = Utc::now();
        let otp = otp_at(now);
        store
            .issue_credential(ResetChannel::Phone, "+15551234567", &otp)
            .await
            .unwrap();

        let guess = PresentedCredential::otp(&wrong_code(otp.secret()), "+15551234567");
        for _ in 0..MAX_ATTEMPTS {
            assert!(store
                .consume_credential(&guess, "$new", now, MAX_ATTEMPTS)
                .await
                .unwrap()
                .is_none());
        }
        let stored = store.find_user_by_id(u.user_id).await.unwrap().unwrap();
        assert_eq!(stored.otp_attempts, MAX_ATTEMPTS as i32);

        let real = PresentedCredential::otp(otp.secret(), "+15551234567");
        assert!(store
            .consume_credential(&real, "$new", now, MAX_ATTEMPTS)
            .await
            .unwrap()
            .is_none());
        let stored = store.find_user_by_id(u.user_id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$argon2id$old");

        // A fresh code starts a fresh count.
        let reissued = otp_at(now);
        store
            .issue_credential(ResetChannel::Phone, "+15551234567", &reissued)
            .await
            .unwrap();
        let stored = store.find_user_by_id(u.user_id).await.unwrap().unwrap();
        assert_eq!(stored.otp_attempts, 0);
        assert_eq!(
            store
                .consume_credential(
                    &PresentedCredential::otp(reissued.secret(), "+15551234567"),
                    "$new",
                    now,
                    MAX_ATTEMPTS
                )
                .await
                .unwrap(),
            Some(u.user_id)
        );
    }

    #[tokio::test]
    async fn update_password_hash_clears_pending_reset() {
        let store = InMemoryCredentialStore::new();
        let u = user("a@shop.test", None);
        store.insert_user(&u).await.unwrap();
        store
            .issue_credential(ResetChannel::Email, "a@shop.test", &token_at(Utc::now()))
            .await
            .unwrap();

        assert!(store.update_password_hash(u.user_id, "$changed").await.unwrap());
        let stored = store.find_user_by_id(u.user_id).await.unwrap().unwrap();
        assert!(stored.has_no_reset_artifacts());
        assert!(!store.update_password_hash(Uuid::new_v4(), "$x").await.unwrap());
    }
}
