//! Authentication tokens
//!
//! Two kinds of token are issued:
//!
//! - JWT access tokens (HS256) whose claims carry the user's identity. They
//!   double as email activation tokens.
//! - Password reset tokens of the form `<timestamp base36>-<hmac hex>`. The
//!   HMAC covers the user's id, password hash and status, so a password
//!   change or activation invalidates every outstanding reset token.

use crate::config::AuthConfig;
use crate::models::User;
use anyhow::Result;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Who a token was issued to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub email: String,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub identity: Identity,
    pub iat: i64,
    pub exp: i64,
}

/// Why a JWT was rejected. The display strings are returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Expired Token.")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

/// Issues and checks access and reset tokens
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl_seconds: i64,
    reset_ttl_seconds: i64,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, ttl_seconds: u64, reset_ttl_seconds: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl_seconds: ttl_seconds as i64,
            reset_ttl_seconds: reset_ttl_seconds as i64,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.secret_key.clone(),
            config.token_ttl_seconds,
            config.reset_token_ttl_seconds,
        )
    }

    /// Issue an access token for `user`
    pub fn issue(&self, user: &User) -> Result<String> {
        self.issue_at(user, Utc::now().timestamp())
    }

    /// Issue an access token as if the current time were `now`
    pub fn issue_at(&self, user: &User, now: i64) -> Result<String> {
        let claims = Claims {
            identity: Identity {
                username: user.username.clone(),
                email: user.email.clone(),
            },
            iat: now,
            exp: now + self.ttl_seconds,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate an access token
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
    }

    /// Generate a password reset token for `user`
    pub fn make_reset_token(&self, user: &User) -> Result<String> {
        self.make_reset_token_at(user, Utc::now().timestamp())
    }

    pub fn make_reset_token_at(&self, user: &User, timestamp: i64) -> Result<String> {
        let timestamp = u64::try_from(timestamp)
            .map_err(|_| anyhow::anyhow!("Reset token timestamp before epoch"))?;
        let signature = self.reset_signature(user, timestamp)?;
        Ok(format!("{}-{}", to_base36(timestamp), signature))
    }

    /// Whether `token` is a live reset token for `user`
    pub fn check_reset_token(&self, user: &User, token: &str) -> bool {
        self.check_reset_token_at(user, token, Utc::now().timestamp())
    }

    pub fn check_reset_token_at(&self, user: &User, token: &str, now: i64) -> bool {
        let Some((ts_part, _)) = token.split_once('-') else {
            return false;
        };
        let Ok(timestamp) = u64::from_str_radix(ts_part, 36) else {
            return false;
        };
        if now.saturating_sub(timestamp as i64) > self.reset_ttl_seconds {
            return false;
        }

        match self.make_reset_token_at(user, timestamp as i64) {
            Ok(expected) => constant_time_eq(expected.as_bytes(), token.as_bytes()),
            Err(_) => false,
        }
    }

    fn reset_signature(&self, user: &User, timestamp: u64) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;
        mac.update(user.id.to_string().as_bytes());
        mac.update(user.password_hash.as_bytes());
        mac.update(user.status.to_string().as_bytes());
        mac.update(timestamp.to_string().as_bytes());

        Ok(mac
            .finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect())
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
