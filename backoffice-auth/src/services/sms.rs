//! SMS delivery for phone-channel reset codes.
//!
//! `HttpSmsService` talks to a Twilio-compatible Messages endpoint:
//! form-encoded `To`/`From`/`Body`, HTTP basic auth with the account SID.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmsConfig;

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_reset_code(&self, phone_number: &str, code: &str) -> Result<(), AppError>;
}

#[derive(Debug, Serialize)]
struct MessageForm<'a> {
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "Body")]
    body: String,
}

#[derive(Clone)]
pub struct HttpSmsService {
    client: Client,
    config: SmsConfig,
    ttl_minutes: i64,
}

impl HttpSmsService {
    pub fn new(config: SmsConfig, ttl_minutes: i64) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Failed to build SMS client: {}", e)))?;

        tracing::info!(api_url = %config.api_url, "SMS service initialized");

        Ok(Self {
            client,
            config,
            ttl_minutes,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.config.api_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsProvider for HttpSmsService {
    async fn send_reset_code(&self, phone_number: &str, code: &str) -> Result<(), AppError> {
        let form = MessageForm {
            to: phone_number,
            from: &self.config.from_number,
            body: format!(
                "Your password reset code is {}. It expires in {} minutes.",
                code, self.ttl_minutes
            ),
        };

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "SMS request failed");
                AppError::InternalError(anyhow::anyhow!("SMS request failed: {}", e))
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(status = %status, "Reset code SMS accepted");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "SMS provider rejected message");
            Err(AppError::InternalError(anyhow::anyhow!(
                "SMS provider returned {}",
                status
            )))
        }
    }
}

/// An SMS captured by `MockSmsService`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub to: String,
    pub code: String,
}

#[derive(Default)]
pub struct MockSmsService {
    sent: Mutex<Vec<SentSms>>,
    fail: bool,
}

impl MockSmsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SmsProvider for MockSmsService {
    async fn send_reset_code(&self, phone_number: &str, code: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "mock SMS provider unavailable"
            )));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentSms {
                to: phone_number.to_string(),
                code: code.to_string(),
            });
        }
        Ok(())
    }
}
