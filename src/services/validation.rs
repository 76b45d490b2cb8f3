//! Input validation shared by the services
//!
//! Field failures are collected into `FieldErrors`, which the API layer
//! renders as `{"field": ["message", ...]}`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const MAX_USERNAME_LENGTH: usize = 30;
pub const MAX_EMAIL_LENGTH: usize = 30;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 80;
pub const MAX_RESET_PASSWORD_LENGTH: usize = 128;

pub const BLANK: &str = "This field may not be blank.";
pub const INVALID_INTEGER: &str = "A valid integer is required.";
pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_PASSWORD: &str =
    "Password invalid. Password must be 8 characters long, include numbers and letters and have no spaces";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email pattern is valid")
});

/// Validation failures keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single failure on one field
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// The first message in field order, used as the summary message
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().flatten().next().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.first_message().unwrap_or("Invalid input"))
    }
}

impl std::error::Error for FieldErrors {}

/// Message for text longer than `max` characters
pub fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {} characters.", max)
}

pub fn check_username(username: &str, errors: &mut FieldErrors) {
    if username.trim().is_empty() {
        errors.add("username", BLANK);
    } else if username.chars().count() > MAX_USERNAME_LENGTH {
        errors.add("username", too_long(MAX_USERNAME_LENGTH));
    }
}

pub fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.trim().is_empty() {
        errors.add("email", BLANK);
        return;
    }
    if email.chars().count() > MAX_EMAIL_LENGTH {
        errors.add("email", too_long(MAX_EMAIL_LENGTH));
    }
    if !is_valid_email(email) {
        errors.add("email", INVALID_EMAIL);
    }
}

pub fn check_password(password: &str, errors: &mut FieldErrors) {
    if !is_valid_password(password) {
        errors.add("password", INVALID_PASSWORD);
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// 8 to 80 characters with a digit, a lowercase letter and no whitespace
pub fn is_valid_password(password: &str) -> bool {
    let len = password.chars().count();
    (MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len)
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_lowercase())
        && !password.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("jake@jake.jake"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(!is_valid_email("jake"));
        assert!(!is_valid_email("jake@"));
        assert!(!is_valid_email("jake@localhost"));
        assert!(!is_valid_email("ja ke@example.com"));
    }

    #[test]
    fn test_password_rules() {
        assert!(is_valid_password("jakejake1"));
        assert!(!is_valid_password("short1"));
        assert!(!is_valid_password("nodigitshere"));
        assert!(!is_valid_password("ALLUPPER123"));
        assert!(!is_valid_password("has space 123"));
        assert!(!is_valid_password(&format!("a1{}", "x".repeat(79))));
    }

    #[test]
    fn test_username_rules() {
        let mut errors = FieldErrors::new();
        check_username("   ", &mut errors);
        assert_eq!(errors.get("username").unwrap(), [BLANK.to_string()]);

        let mut errors = FieldErrors::new();
        check_username(&"u".repeat(31), &mut errors);
        assert_eq!(errors.first_message(), Some(too_long(30).as_str()));

        let mut errors = FieldErrors::new();
        check_username("jake", &mut errors);
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_field_errors_serialize_as_map() {
        let mut errors = FieldErrors::single("email", INVALID_EMAIL);
        errors.add("email", too_long(30));
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"email": [INVALID_EMAIL, too_long(30)]})
        );
        assert_eq!(errors.to_string(), INVALID_EMAIL);
    }

    proptest! {
        #[test]
        fn passwords_with_whitespace_are_rejected(
            prefix in "[a-z0-9]{4,20}",
            suffix in "[a-z0-9]{4,20}",
        ) {
            let password = format!("{} {}", prefix, suffix);
            prop_assert!(!is_valid_password(&password));
        }

        #[test]
        fn lowercase_and_digit_passwords_are_accepted(
            letters in "[a-z]{4,40}",
            digits in "[0-9]{4,39}",
        ) {
            let password = format!("{}{}", letters, digits);
            prop_assert!(is_valid_password(&password));
        }
    }
}
