//! Account operations behind the role gate: login, self-service password
//! change and super-admin user management.

use std::sync::Arc;
use uuid::Uuid;

use super::error::ServiceError;
use super::recovery::check_password_strength;
use super::session::SessionService;
use super::store::CredentialStore;
use crate::config::BootstrapAdminConfig;
use crate::models::{Role, User};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub expires_in: i64,
    pub role: Role,
}

/// Input for provisioning a new back-office user.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub phone: Option<String>,
    pub password: Password,
    pub role: Role,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    sessions: SessionService,
    password_min_length: usize,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        sessions: SessionService,
        password_min_length: usize,
    ) -> Self {
        Self {
            store,
            sessions,
            password_min_length,
        }
    }

    /// Exchange email and password for a session token. Unknown, inactive
    /// and wrong-password cases all yield `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &Password) -> Result<LoginOutcome, ServiceError> {
        let user = self
            .store
            .find_user_by_email(email.trim())
            .await?
            .filter(|u| u.is_active)
            .ok_or(ServiceError::InvalidCredentials)?;

        if !verify_password(password, &PasswordHashString::new(user.password_hash.clone())) {
            tracing::info!(user_id = %user.user_id, "Login failed: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let role = user.role().map_err(|e| {
            tracing::error!(user_id = %user.user_id, error = %e, "Stored role is not recognized");
            ServiceError::InvalidCredentials
        })?;

        let access_token = self.sessions.issue(user.user_id, role)?;
        tracing::info!(user_id = %user.user_id, role = %role, "User logged in");

        Ok(LoginOutcome {
            access_token,
            expires_in: self.sessions.expiry_seconds(),
            role,
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    /// Replace the caller's password after checking the current one. Any
    /// outstanding reset credential is dropped with the old password.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &Password,
        new: &Password,
    ) -> Result<(), ServiceError> {
        check_password_strength(new, self.password_min_length)?;

        let user = self.profile(user_id).await?;
        if !verify_password(current, &PasswordHashString::new(user.password_hash.clone())) {
            return Err(ServiceError::IncorrectCurrentPassword);
        }

        let new_hash = hash_password(new)?;
        if !self
            .store
            .update_password_hash(user_id, new_hash.as_str())
            .await?
        {
            return Err(ServiceError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.store.list_users().await?)
    }

    pub async fn provision_user(&self, new_user: NewUser) -> Result<User, ServiceError> {
        check_password_strength(&new_user.password, self.password_min_length)?;

        let email = new_user.email.trim().to_string();
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let hash = hash_password(&new_user.password)?;
        let phone = new_user
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        let user = User::new(email, phone, hash.into_string(), new_user.role);

        self.store.insert_user(&user).await.map_err(|e| match e {
            service_core::error::AppError::Conflict(_) => ServiceError::EmailAlreadyRegistered,
            other => ServiceError::Store(other),
        })?;

        tracing::info!(user_id = %user.user_id, role = %new_user.role, "User provisioned");
        Ok(user)
    }

    pub async fn set_active(&self, user_id: Uuid, active: bool) -> Result<User, ServiceError> {
        if !self.store.set_user_active(user_id, active).await? {
            return Err(ServiceError::UserNotFound);
        }
        tracing::info!(user_id = %user_id, active, "User status changed");
        self.profile(user_id).await
    }

    /// Create the configured super admin if no user owns that email yet.
    /// Returns true when a user was created.
    pub async fn bootstrap_super_admin(
        &self,
        config: &BootstrapAdminConfig,
    ) -> Result<bool, ServiceError> {
        if self.store.find_user_by_email(&config.email).await?.is_some() {
            tracing::debug!("Bootstrap super admin already present");
            return Ok(false);
        }

        let user = self
            .provision_user(NewUser {
                email: config.email.clone(),
                phone: None,
                password: Password::new(config.password.clone()),
                role: Role::SuperAdmin,
            })
            .await?;

        tracing::info!(user_id = %user.user_id, "Bootstrap super admin created");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::services::store::InMemoryCredentialStore;

    fn service() -> (Arc<InMemoryCredentialStore>, AccountService) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let sessions = SessionService::new(&SessionConfig {
            secret: "0123456789abcdef0123456789abcdef".to_string(),
            expiry_minutes: 30,
        });
        let service = AccountService::new(store.clone(), sessions, 6);
        (store, service)
    }

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            email: email.to_string(),
            phone: None,
            password: Password::new("correct-horse".to_string()),
            role,
        }
    }

    #[tokio::test]
    async fn login_returns_token_for_valid_credentials() {
        let (_, service) = service();
        service
            .provision_user(new_user("admin@shop.test", Role::Admin))
            .await
            .unwrap();

        let outcome = service
            .login("ADMIN@shop.test", &Password::new("correct-horse".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.role, Role::Admin);
        assert_eq!(outcome.expires_in, 1800);
        assert!(!outcome.access_token.is_empty());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_inactive_users() {
        let (_, service) = service();
        let user = service
            .provision_user(new_user("admin@shop.test", Role::Admin))
            .await
            .unwrap();

        let wrong = service
            .login("admin@shop.test", &Password::new("nope-nope".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(wrong, ServiceError::InvalidCredentials));

        service.set_active(user.user_id, false).await.unwrap();
        let inactive = service
            .login("admin@shop.test", &Password::new("correct-horse".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(inactive, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_provision_is_rejected() {
        let (_, service) = service();
        service
            .provision_user(new_user("a@shop.test", Role::User))
            .await
            .unwrap();
        let err = service
            .provision_user(new_user("A@SHOP.test", Role::User))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmailAlreadyRegistered));
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let (store, service) = service();
        let user = service
            .provision_user(new_user("a@shop.test", Role::User))
            .await
            .unwrap();

        let err = service
            .change_password(
                user.user_id,
                &Password::new("not-current".to_string()),
                &Password::new("next-password".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::IncorrectCurrentPassword));

        service
            .change_password(
                user.user_id,
                &Password::new("correct-horse".to_string()),
                &Password::new("next-password".to_string()),
            )
            .await
            .unwrap();

        let stored = store.find_user_by_id(user.user_id).await.unwrap().unwrap();
        assert!(verify_password(
            &Password::new("next-password".to_string()),
            &PasswordHashString::new(stored.password_hash)
        ));
    }

    #[tokio::test]
    async fn set_active_on_unknown_user_is_not_found() {
        let (_, service) = service();
        let err = service.set_active(Uuid::new_v4(), false).await.unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound));
    }

    #[tokio::test]
    async fn bootstrap_runs_once() {
        let (store, service) = service();
        let config = BootstrapAdminConfig {
            email: "owner@shop.test".to_string(),
            password: "owner-password".to_string(),
        };

        assert!(service.bootstrap_super_admin(&config).await.unwrap());
        assert!(!service.bootstrap_super_admin(&config).await.unwrap());

        let owner = store
            .find_user_by_email("owner@shop.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.role().unwrap(), Role::SuperAdmin);
    }
}
