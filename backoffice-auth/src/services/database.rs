//! PostgreSQL credential store.
//!
//! Uses sqlx runtime queries against the `users` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::store::{attempt_cap, CredentialStore};
use crate::models::{CredentialKind, IssuedCredential, PresentedCredential, ResetChannel, User};

const USER_COLUMNS: &str = "user_id, email, phone, password_hash, role_code, is_active, \
    reset_token, reset_token_expires, otp_code, otp_expires, otp_attempts, created_utc, updated_utc";

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!(e))
}

#[async_trait]
impl CredentialStore for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_utc",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, phone, password_hash, role_code, is_active, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.role_code)
        .bind(user.is_active)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            _ => db_error(e),
        })?;
        Ok(())
    }

    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET is_active = $1, updated_utc = NOW() WHERE user_id = $2",
        )
        .bind(active)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1,
                reset_token = NULL, reset_token_expires = NULL,
                otp_code = NULL, otp_expires = NULL, otp_attempts = 0,
                updated_utc = NOW()
            WHERE user_id = $2
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn issue_credential(
        &self,
        channel: ResetChannel,
        identifier: &str,
        credential: &IssuedCredential,
    ) -> Result<Option<User>, AppError> {
        let assignments = match credential.kind {
            CredentialKind::Token => {
                "reset_token = $1, reset_token_expires = $2, otp_code = NULL, otp_expires = NULL"
            }
            CredentialKind::Otp => {
                "otp_code = $1, otp_expires = $2, reset_token = NULL, reset_token_expires = NULL"
            }
        };
        let predicate = match channel {
            ResetChannel::Email => "LOWER(email) = LOWER($3)",
            ResetChannel::Phone => "phone = $3",
        };

        // Lookup and write are one statement, so a known and an unknown
        // identifier cost the same round trip.
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET {}, otp_attempts = 0, updated_utc = NOW()
            WHERE user_id = (
                SELECT user_id FROM users
                WHERE {} AND is_active
                ORDER BY created_utc
                LIMIT 1
            )
            RETURNING {}
            "#,
            assignments, predicate, USER_COLUMNS
        ))
        .bind(&credential.digest)
        .bind(credential.expires_at)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn consume_credential(
        &self,
        presented: &PresentedCredential,
        new_password_hash: &str,
        now: DateTime<Utc>,
        max_otp_attempts: u32,
    ) -> Result<Option<Uuid>, AppError> {
        match presented {
            PresentedCredential::Token { digest } => {
                let row: Option<(Uuid,)> = sqlx::query_as(
                    r#"
                    UPDATE users
                    SET password_hash = $2,
                        reset_token = NULL, reset_token_expires = NULL,
                        otp_code = NULL, otp_expires = NULL, otp_attempts = 0,
                        updated_utc = $3
                    WHERE reset_token = $1
                      AND reset_token_expires > $3
                      AND is_active
                    RETURNING user_id
                    "#,
                )
                .bind(digest)
                .bind(new_password_hash)
                .bind(now)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

                Ok(row.map(|(user_id,)| user_id))
            }
            PresentedCredential::Otp { digest, phone } => {
                // Pin one outstanding code for the phone under a row lock,
                // then either consume it or count the miss against it.
                let cap = attempt_cap(max_otp_attempts);
                let row: Option<(Uuid, bool, i32)> = sqlx::query_as(
                    r#"
                    WITH target AS (
                        SELECT user_id, otp_code = $1 AS matched
                        FROM users
                        WHERE phone = $4
                          AND is_active
                          AND otp_code IS NOT NULL
                          AND otp_expires > $3
                          AND otp_attempts < $5
                        ORDER BY (otp_code = $1) DESC, updated_utc DESC
                        LIMIT 1
                        FOR UPDATE
                    )
                    UPDATE users u
                    SET password_hash = CASE WHEN t.matched THEN $2 ELSE u.password_hash END,
                        otp_code = CASE WHEN t.matched THEN NULL ELSE u.otp_code END,
                        otp_expires = CASE WHEN t.matched THEN NULL ELSE u.otp_expires END,
                        reset_token = CASE WHEN t.matched THEN NULL ELSE u.reset_token END,
                        reset_token_expires = CASE WHEN t.matched THEN NULL ELSE u.reset_token_expires END,
                        otp_attempts = CASE WHEN t.matched THEN 0 ELSE u.otp_attempts + 1 END,
                        updated_utc = CASE WHEN t.matched THEN $3 ELSE u.updated_utc END
                    FROM target t
                    WHERE u.user_id = t.user_id
                    RETURNING u.user_id, t.matched, u.otp_attempts
                    "#,
                )
                .bind(digest)
                .bind(new_password_hash)
                .bind(now)
                .bind(phone)
                .bind(cap)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

                match row {
                    Some((user_id, true, _)) => Ok(Some(user_id)),
                    Some((user_id, false, attempts)) => {
                        if attempts >= cap {
                            tracing::warn!(user_id = %user_id, "Reset code locked after too many wrong attempts");
                        }
                        Ok(None)
                    }
                    None => Ok(None),
                }
            }
        }
    }
}
