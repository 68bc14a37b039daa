//! Reset credential model - the transient token or OTP that authorizes one
//! password change.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

const TOKEN_BYTES: usize = 32;
const OTP_MIN: u32 = 100_000;
const OTP_MAX: u32 = 999_999;

/// Delivery channel chosen by the caller of `/password/forgot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResetChannel {
    Email,
    Phone,
}

impl ResetChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetChannel::Email => "email",
            ResetChannel::Phone => "phone",
        }
    }
}

/// Which pair of user columns a credential lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// 64-char hex token delivered by email.
    Token,
    /// 6-digit code delivered by SMS.
    Otp,
}

impl From<ResetChannel> for CredentialKind {
    fn from(channel: ResetChannel) -> Self {
        match channel {
            ResetChannel::Email => CredentialKind::Token,
            ResetChannel::Phone => CredentialKind::Otp,
        }
    }
}

/// A freshly issued credential. `secret` goes to the user, `digest` goes to
/// storage.
#[derive(Clone)]
pub struct IssuedCredential {
    pub kind: CredentialKind,
    secret: String,
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedCredential {
    /// Generate a credential of `kind` valid for `ttl` from `now`.
    pub fn generate(kind: CredentialKind, now: DateTime<Utc>, ttl: Duration) -> Self {
        let secret = match kind {
            CredentialKind::Token => generate_token(),
            CredentialKind::Otp => generate_otp(),
        };
        Self::from_secret(kind, secret, now + ttl)
    }

    pub fn from_secret(kind: CredentialKind, secret: String, expires_at: DateTime<Utc>) -> Self {
        let digest = digest_secret(&secret);
        Self {
            kind,
            secret,
            digest,
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("kind", &self.kind)
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What a caller of `/password/reset` presented, already digested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedCredential {
    Token { digest: String },
    Otp { digest: String, phone: String },
}

impl PresentedCredential {
    pub fn token(raw: &str) -> Self {
        PresentedCredential::Token {
            digest: digest_secret(raw.trim()),
        }
    }

    pub fn otp(raw: &str, phone: &str) -> Self {
        PresentedCredential::Otp {
            digest: digest_secret(raw.trim()),
            phone: phone.trim().to_string(),
        }
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            PresentedCredential::Token { .. } => CredentialKind::Token,
            PresentedCredential::Otp { .. } => CredentialKind::Otp,
        }
    }
}

/// 256 bits from the thread CSPRNG, hex-encoded.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; TOKEN_BYTES] = rng.gen();
    hex::encode(token_bytes)
}

/// Uniform 6-digit decimal code.
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(OTP_MIN..=OTP_MAX).to_string()
}

/// Hash a reset secret for storage.
pub fn digest_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn otp_is_six_digits_in_range() {
        for _ in 0..1_000 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            let value: u32 = otp.parse().unwrap();
            assert!((OTP_MIN..=OTP_MAX).contains(&value));
        }
    }

    #[test]
    fn consecutive_tokens_differ() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn issued_credential_stores_digest_not_secret() {
        let now = Utc::now();
        let issued = IssuedCredential::generate(CredentialKind::Token, now, Duration::minutes(15));
        assert_ne!(issued.digest, issued.secret());
        assert_eq!(issued.digest, digest_secret(issued.secret()));
        assert_eq!(issued.expires_at, now + Duration::minutes(15));
    }

    #[test]
    fn presented_token_digest_matches_issued_digest() {
        let issued = IssuedCredential::generate(
            CredentialKind::Otp,
            Utc::now(),
            Duration::minutes(15),
        );
        let presented = PresentedCredential::otp(issued.secret(), " +15551234567 ");
        assert_eq!(
            presented,
            PresentedCredential::Otp {
                digest: issued.digest.clone(),
                phone: "+15551234567".to_string(),
            }
        );
    }

    #[test]
    fn debug_output_redacts_secret() {
        let issued = IssuedCredential::from_secret(
            CredentialKind::Otp,
            "123456".to_string(),
            Utc::now(),
        );
        let rendered = format!("{:?}", issued);
        assert!(!rendered.contains("123456"));
    }

    #[test]
    fn channel_maps_to_kind() {
        assert_eq!(CredentialKind::from(ResetChannel::Email), CredentialKind::Token);
        assert_eq!(CredentialKind::from(ResetChannel::Phone), CredentialKind::Otp);
    }
}
