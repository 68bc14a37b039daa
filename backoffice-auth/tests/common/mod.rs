//! Test helpers for backoffice-auth integration tests.
//!
//! Builds the full router over the in-memory credential store and mock
//! notification providers.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use backoffice_auth::{
    build_router,
    config::{
        AuthConfig, DatabaseConfig, Environment, RateLimitConfig, ResetConfig, SecurityConfig,
        SessionConfig, SmsConfig, SmtpConfig, SwaggerConfig, SwaggerMode,
    },
    models::{Role, User},
    services::{CredentialStore, InMemoryCredentialStore, MockEmailService, MockSmsService},
    utils::{hash_password, Password},
    AppState,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

pub const TEST_PASSWORD: &str = "current-password";

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: service_core::config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "backoffice-auth".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        session: SessionConfig {
            secret: "integration-test-secret-0123456789abcdef".to_string(),
            expiry_minutes: 60,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            user: "mailer".to_string(),
            password: "mailer".to_string(),
            from_address: "no-reply@shop.test".to_string(),
        },
        sms: SmsConfig {
            api_url: "http://localhost:4010".to_string(),
            account_sid: "AC-test".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15550000000".to_string(),
            timeout_seconds: 1,
        },
        reset: ResetConfig {
            credential_ttl_minutes: 15,
            password_min_length: 6,
            otp_max_attempts: 5,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            password_forgot_attempts: 100,
            password_forgot_window_seconds: 60,
            password_reset_attempts: 100,
            password_reset_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
        },
        bootstrap: None,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryCredentialStore>,
    pub email: Arc<MockEmailService>,
    pub sms: Arc<MockSmsService>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(test_config())
    }

    pub fn spawn_with(config: AuthConfig) -> Self {
        let store = Arc::new(InMemoryCredentialStore::new());
        let email = Arc::new(MockEmailService::new());
        let sms = Arc::new(MockSmsService::new());

        let state = AppState::new(config, store.clone(), email.clone(), sms.clone());
        let router = build_router(state.clone()).expect("Failed to build router");

        Self {
            router,
            state,
            store,
            email,
            sms,
        }
    }

    /// Insert an active user whose password is `TEST_PASSWORD`.
    pub async fn seed_user(&self, email: &str, phone: Option<&str>, role: Role) -> User {
        let hash = hash_password(&Password::new(TEST_PASSWORD.to_string()))
            .expect("Failed to hash password");
        let user = User::new(
            email.to_string(),
            phone.map(str::to_string),
            hash.into_string(),
            role,
        );
        self.store
            .insert_user(&user)
            .await
            .expect("Failed to insert user");
        user
    }

    pub fn token_for(&self, user: &User) -> String {
        let role = user.role().expect("seeded role is valid");
        self.state
            .sessions
            .issue(user.user_id, role)
            .expect("Failed to issue session")
    }

    pub async fn stored(&self, user: &User) -> User {
        self.store
            .find_user_by_id(user.user_id)
            .await
            .expect("store lookup failed")
            .expect("user missing")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body read failed")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, body, None)).await
    }

    pub async fn get_authed(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Wait for background notification tasks to record `count` emails.
    pub async fn wait_for_emails(&self, count: usize) -> Vec<backoffice_auth::services::SentEmail> {
        for _ in 0..200 {
            let sent = self.email.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} emails, got {}", count, self.email.sent().len());
    }

    pub async fn wait_for_sms(&self, count: usize) -> Vec<backoffice_auth::services::SentSms> {
        for _ in 0..200 {
            let sent = self.sms.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} sms, got {}", count, self.sms.sent().len());
    }
}

pub fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
