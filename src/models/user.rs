//! User model
//!
//! Accounts start out inactive and become active once the owner follows the
//! activation link sent by email, or immediately for social logins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix that marks a password hash nobody can log in with.
pub const UNUSABLE_PASSWORD_PREFIX: &str = "!";

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Unique, at most 30 characters
    pub username: String,
    /// Unique email address
    pub email: String,
    /// Argon2 hash, or an unusable marker for social-only accounts
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bio: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a new, not yet activated user.
    ///
    /// The password must already be hashed with
    /// `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            bio: None,
            image: None,
            status: UserStatus::Inactive,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Social-only accounts carry a hash that never verifies.
    pub fn has_usable_password(&self) -> bool {
        !self.password_hash.starts_with(UNUSABLE_PASSWORD_PREFIX)
    }

    /// Whether this user owns content written by `author_id`
    pub fn owns(&self, author_id: i64) -> bool {
        self.id == author_id
    }
}

/// Account state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Registered but the email address is not confirmed yet
    #[default]
    Inactive,
    Active,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Inactive => write!(f, "inactive"),
            UserStatus::Active => write!(f, "active"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inactive" => Ok(UserStatus::Inactive),
            "active" => Ok(UserStatus::Active),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Partial update of the current user. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Plaintext, hashed by the service
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

/// Public view of a user, as seen by `viewer`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub following: bool,
}

impl Profile {
    pub fn from_user(user: &User, following: bool) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            bio: non_empty(&user.bio),
            image: non_empty(&user.image),
            following,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}
