//! User service
//!
//! Account lifecycle and authentication:
//! - registration with email activation
//! - login with JWT issuance
//! - current-user reads and partial updates
//! - password reset by emailed token
//! - social login through Google or Facebook

use crate::db::repositories::UserRepository;
use crate::models::{UpdateUserInput, User, UserStatus};
use crate::services::email::{DynMailer, EmailTemplates, OutgoingEmail};
use crate::services::password::{hash_password, unusable_password, verify_password};
use crate::services::social::SocialProviders;
use crate::services::token::{TokenError, TokenService};
use crate::services::validation::{
    check_email, check_password, check_username, too_long, FieldErrors,
    MAX_RESET_PASSWORD_LENGTH, MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH,
};
use anyhow::Context;
use std::sync::Arc;
use uuid::Uuid;

pub const REGISTERED_MESSAGE: &str =
    "Please confirm your email address to complete the registration";
pub const USERNAME_TAKEN: &str = "Username already exists, please enter a different username";
pub const EMAIL_TAKEN: &str = "Email already exists, please login or use a different email";
pub const EMAIL_REQUIRED: &str = "An email address is required to log in.";
pub const PASSWORD_REQUIRED: &str = "A password is required to log in.";
pub const INVALID_CREDENTIALS: &str = "email or password used is invalid";
pub const ACCOUNT_INACTIVE: &str = "Please verify your email address to activate account";
pub const RESET_EMAIL_UNKNOWN: &str = "User with this email was not found";
pub const RESET_REQUESTED_MESSAGE: &str =
    "Please confirm your email address to complete your password reset";
pub const RESET_TOKEN_INVALID: &str = "Invalid token or Activation expired";
pub const RESET_DONE_MESSAGE: &str = "You have successfully reset your password";
pub const INVALID_PROVIDER: &str = "Invalid provider";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Field-level validation failures
    #[error("{0}")]
    Validation(FieldErrors),

    /// Request rejected with a single message
    #[error("{0}")]
    BadRequest(String),

    /// Access token could not be used
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<FieldErrors> for UserServiceError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// An authenticated user and a freshly issued token
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// Result of following an activation link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The token names no known user
    Invalid,
    AlreadyUsed,
    Activated,
}

impl ActivationOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Invalid => "Activation link is invalid!",
            Self::AlreadyUsed => "Activation link has been used!",
            Self::Activated => {
                "Thank you for confirming your email address. Welcome to Authors' Haven."
            }
        }
    }
}

/// Registration input
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Login input. Missing fields arrive as empty strings.
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Password reset completion input
#[derive(Debug, Clone)]
pub struct ResetPasswordInput {
    pub email: String,
    pub reset_token: String,
    pub new_password: String,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: TokenService,
    mailer: DynMailer,
    templates: EmailTemplates,
    social: SocialProviders,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        tokens: TokenService,
        mailer: DynMailer,
        templates: EmailTemplates,
        social: SocialProviders,
    ) -> Self {
        Self {
            user_repo,
            tokens,
            mailer,
            templates,
            social,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register an inactive user and email an activation link.
    ///
    /// A failed delivery is logged; the account is still created.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let mut errors = FieldErrors::new();
        check_username(&input.username, &mut errors);
        check_email(&input.email, &mut errors);
        check_password(&input.password, &mut errors);

        if errors.get("username").is_none() && self.username_taken(&input.username, None).await? {
            errors.add("username", USERNAME_TAKEN);
        }
        if errors.get("email").is_none() && self.email_taken(&input.email, None).await? {
            errors.add("email", EMAIL_TAKEN);
        }
        errors.into_result()?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&User::new(input.username, input.email, password_hash))
            .await
            .map_err(storage_error)?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");

        let token = self.tokens.issue(&user)?;
        let email = self.templates.activation(&user.email, &user.username, &token);
        self.deliver(email).await;

        Ok(user)
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, UserServiceError> {
        if input.email.trim().is_empty() {
            return Err(UserServiceError::BadRequest(EMAIL_REQUIRED.to_string()));
        }
        if input.password.is_empty() {
            return Err(UserServiceError::BadRequest(PASSWORD_REQUIRED.to_string()));
        }

        let user = self
            .user_repo
            .get_by_email(input.email.trim())
            .await
            .context("Failed to look up user")?
            .ok_or_else(|| UserServiceError::BadRequest(INVALID_CREDENTIALS.to_string()))?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(UserServiceError::BadRequest(INVALID_CREDENTIALS.to_string()));
        }

        if !user.is_active() {
            return Err(UserServiceError::BadRequest(ACCOUNT_INACTIVE.to_string()));
        }

        self.session_for(user)
    }

    /// Activate the account named by an activation token
    pub async fn activate(&self, token: &str) -> Result<ActivationOutcome, UserServiceError> {
        let claims = self.tokens.decode(token)?;

        let Some(mut user) = self
            .user_repo
            .get_by_email(&claims.identity.email)
            .await
            .context("Failed to look up user")?
        else {
            return Ok(ActivationOutcome::Invalid);
        };

        if user.is_active() {
            return Ok(ActivationOutcome::AlreadyUsed);
        }

        user.status = UserStatus::Active;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to activate user")?;

        tracing::info!(user_id = user.id, "Account activated");
        Ok(ActivationOutcome::Activated)
    }

    /// Resolve an access token to an active user.
    ///
    /// Tokens for unknown or inactive users resolve to `None`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let claims = self.tokens.decode(token)?;
        let user = self
            .user_repo
            .get_by_email(&claims.identity.email)
            .await
            .context("Failed to look up user")?;

        Ok(user.filter(|u| u.is_active() && u.username == claims.identity.username))
    }

    /// The current user with a new token
    pub fn current(&self, user: User) -> Result<AuthSession, UserServiceError> {
        self.session_for(user)
    }

    /// Apply a partial update to the current user
    pub async fn update(
        &self,
        mut user: User,
        input: UpdateUserInput,
    ) -> Result<AuthSession, UserServiceError> {
        let mut errors = FieldErrors::new();

        if let Some(username) = &input.username {
            check_username(username, &mut errors);
            if errors.get("username").is_none()
                && self.username_taken(username, Some(user.id)).await?
            {
                errors.add("username", USERNAME_TAKEN);
            }
        }
        if let Some(email) = &input.email {
            check_email(email, &mut errors);
            if errors.get("email").is_none() && self.email_taken(email, Some(user.id)).await? {
                errors.add("email", EMAIL_TAKEN);
            }
        }
        if let Some(password) = &input.password {
            check_password(password, &mut errors);
        }
        errors.into_result()?;

        if let Some(username) = input.username {
            user.username = username;
        }
        if let Some(email) = input.email {
            user.email = email;
        }
        if let Some(password) = input.password {
            user.password_hash = hash_password(&password).context("Failed to hash password")?;
        }
        if let Some(bio) = input.bio {
            user.bio = Some(bio);
        }
        if let Some(image) = input.image {
            user.image = Some(image);
        }

        let updated = self
            .user_repo
            .update(&user)
            .await
            .map_err(storage_error)?;

        self.session_for(updated)
    }

    /// Email a password reset link to the owner of `email`
    pub async fn request_password_reset(&self, email: &str) -> Result<(), UserServiceError> {
        let user = self
            .user_repo
            .get_by_email(email.trim())
            .await
            .context("Failed to look up user")?
            .ok_or_else(|| UserServiceError::BadRequest(RESET_EMAIL_UNKNOWN.to_string()))?;

        let token = self.tokens.make_reset_token(&user)?;
        let message = self
            .templates
            .password_reset(&user.email, &user.username, &token);
        self.deliver(message).await;

        tracing::info!(user_id = user.id, "Password reset requested");
        Ok(())
    }

    /// Set a new password using a reset token
    pub async fn complete_password_reset(
        &self,
        input: ResetPasswordInput,
    ) -> Result<(), UserServiceError> {
        let length = input.new_password.chars().count();
        if length < MIN_PASSWORD_LENGTH {
            return Err(FieldErrors::single(
                "new_password",
                format!(
                    "Ensure this field has at least {} characters.",
                    MIN_PASSWORD_LENGTH
                ),
            )
            .into());
        }
        if length > MAX_RESET_PASSWORD_LENGTH {
            return Err(
                FieldErrors::single("new_password", too_long(MAX_RESET_PASSWORD_LENGTH)).into(),
            );
        }

        let invalid = || UserServiceError::BadRequest(RESET_TOKEN_INVALID.to_string());

        let mut user = self
            .user_repo
            .get_by_email(input.email.trim())
            .await
            .context("Failed to look up user")?
            .ok_or_else(invalid)?;

        if !self.tokens.check_reset_token(&user, &input.reset_token) {
            return Err(invalid());
        }

        user.password_hash =
            hash_password(&input.new_password).context("Failed to hash password")?;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to save new password")?;

        tracing::info!(user_id = user.id, "Password reset completed");
        Ok(())
    }

    /// Sign in with a provider access token, creating the account on first use
    pub async fn social_login(
        &self,
        provider: &str,
        access_token: &str,
    ) -> Result<AuthSession, UserServiceError> {
        let provider = self
            .social
            .get(provider)
            .ok_or_else(|| FieldErrors::single("provider", INVALID_PROVIDER))?;

        let profile = provider
            .fetch_profile(access_token)
            .await
            .map_err(|e| UserServiceError::BadRequest(e.to_string()))?;

        let existing = self
            .user_repo
            .get_by_email(&profile.email)
            .await
            .context("Failed to look up user")?;

        let user = match existing {
            Some(mut user) => {
                let mut changed = false;
                if !user.is_active() {
                    user.status = UserStatus::Active;
                    changed = true;
                }
                if user.image.is_none() && profile.picture.is_some() {
                    user.image = profile.picture.clone();
                    changed = true;
                }
                if changed {
                    user = self
                        .user_repo
                        .update(&user)
                        .await
                        .context("Failed to update social user")?;
                }
                user
            }
            None => {
                let base = profile.name.as_deref().unwrap_or(&profile.email);
                let username = self.unique_username(base).await?;
                let mut user = User::new(username, profile.email.clone(), unusable_password());
                user.status = UserStatus::Active;
                user.image = profile.picture.clone();

                let user = self
                    .user_repo
                    .create(&user)
                    .await
                    .map_err(storage_error)?;
                tracing::info!(
                    user_id = user.id,
                    provider = provider.name(),
                    "User created from social login"
                );
                user
            }
        };

        self.session_for(user)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    fn session_for(&self, user: User) -> Result<AuthSession, UserServiceError> {
        let token = self.tokens.issue(&user)?;
        Ok(AuthSession { user, token })
    }

    async fn deliver(&self, email: OutgoingEmail) {
        let to = email.to.clone();
        if let Err(e) = self.mailer.send(email).await {
            tracing::warn!(to = %to, "Failed to send email: {:#}", e);
        }
    }

    async fn username_taken(
        &self,
        username: &str,
        except: Option<i64>,
    ) -> Result<bool, UserServiceError> {
        let found = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        Ok(found.is_some_and(|u| Some(u.id) != except))
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> Result<bool, UserServiceError> {
        let found = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        Ok(found.is_some_and(|u| Some(u.id) != except))
    }

    /// A free username derived from a display name or email address
    async fn unique_username(&self, source: &str) -> Result<String, UserServiceError> {
        let base = username_base(source);
        if !self.username_taken(&base, None).await? {
            return Ok(base);
        }

        for _ in 0..8 {
            let suffix = Uuid::new_v4().simple().to_string();
            let candidate = format!("{}{}", base, &suffix[..6]);
            if !self.username_taken(&candidate, None).await? {
                return Ok(candidate);
            }
        }

        let mut fallback = Uuid::new_v4().simple().to_string();
        fallback.truncate(MAX_USERNAME_LENGTH);
        Ok(fallback)
    }
}

/// Turn a unique-key failure on `users` into the matching field error
fn storage_error(err: anyhow::Error) -> UserServiceError {
    match duplicated_column(&err) {
        Some(column) if column == "username" => FieldErrors::single("username", USERNAME_TAKEN).into(),
        Some(column) if column == "email" => FieldErrors::single("email", EMAIL_TAKEN).into(),
        _ => UserServiceError::InternalError(err),
    }
}

/// Column named by a unique violation: `users.email` on SQLite,
/// `'users.email'` or `'email'` as the MySQL key
fn duplicated_column(err: &anyhow::Error) -> Option<String> {
    let db = err.chain().find_map(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) if db.is_unique_violation() => Some(db),
        _ => None,
    })?;
    let last = db.message().rsplit([' ', '.', ':']).next()?;
    Some(last.trim_matches(|c| c == '\'' || c == '`').to_string())
}

/// Lowercase alphanumerics of `source` before any `@`, at most 24 chars
fn username_base(source: &str) -> String {
    let local = source.split('@').next().unwrap_or(source);
    let base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_USERNAME_LENGTH - 6)
        .collect();
    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, EmailConfig};
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::services::email::testing::{token_from_link, FailingMailer, RecordingMailer};
    use crate::services::social::testing::FakeProvider;
    use crate::services::social::{SocialProfile, GOOGLE};
    use crate::services::validation::INVALID_PASSWORD;

    struct Harness {
        service: UserService,
        mailer: Arc<RecordingMailer>,
    }

    async fn setup_test_service() -> Harness {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let mailer = Arc::new(RecordingMailer::default());
        let social = SocialProviders::new().with_provider(Arc::new(
            FakeProvider::new(GOOGLE).with_token(
                "google-token",
                SocialProfile {
                    email: "social@example.com".to_string(),
                    name: Some("Social Writer".to_string()),
                    picture: Some("https://img.example.com/s.png".to_string()),
                },
            ),
        ));

        let service = UserService::new(
            SqlxUserRepository::boxed(pool),
            TokenService::from_config(&AuthConfig::default()),
            mailer.clone(),
            EmailTemplates::new(&EmailConfig::default()),
            social,
        );
        Harness { service, mailer }
    }

    async fn register_active(harness: &Harness, name: &str) -> User {
        let user = harness
            .service
            .register(RegisterInput::new(name, format!("{}@example.com", name), "jakejake1"))
            .await
            .unwrap();
        let token = harness.service.tokens().issue(&user).unwrap();
        harness.service.activate(&token).await.unwrap();
        harness
            .service
            .login(LoginInput::new(user.email, "jakejake1"))
            .await
            .unwrap()
            .user
    }

    fn validation_message(err: UserServiceError, field: &str) -> String {
        match err {
            UserServiceError::Validation(errors) => errors.get(field).unwrap()[0].clone(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    /// Lookups that never find anything, leaving duplicates to the unique keys
    struct BlindLookups(Arc<dyn UserRepository>);

    #[async_trait::async_trait]
    impl UserRepository for BlindLookups {
        async fn create(&self, user: &User) -> anyhow::Result<User> {
            self.0.create(user).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
            self.0.get_by_id(id).await
        }

        async fn get_by_username(&self, _username: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }

        async fn get_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }

        async fn update(&self, user: &User) -> anyhow::Result<User> {
            self.0.update(user).await
        }

        async fn delete(&self, id: i64) -> anyhow::Result<()> {
            self.0.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_unique_key_conflicts_become_field_errors() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::boxed(pool);
        users
            .create(&User::new("jake".into(), "jake@jake.jake".into(), "h".into()))
            .await
            .unwrap();
        let anne = users
            .create(&User::new("anne".into(), "anne@example.com".into(), "h".into()))
            .await
            .unwrap();

        let service = UserService::new(
            Arc::new(BlindLookups(users)),
            TokenService::from_config(&AuthConfig::default()),
            Arc::new(RecordingMailer::default()),
            EmailTemplates::new(&EmailConfig::default()),
            SocialProviders::new(),
        );

        let err = service
            .register(RegisterInput::new("jake", "new@example.com", "jakejake1"))
            .await
            .unwrap_err();
        assert_eq!(validation_message(err, "username"), USERNAME_TAKEN);

        let err = service
            .register(RegisterInput::new("newbie", "jake@jake.jake", "jakejake1"))
            .await
            .unwrap_err();
        assert_eq!(validation_message(err, "email"), EMAIL_TAKEN);

        let update = UpdateUserInput {
            email: Some("jake@jake.jake".to_string()),
            ..Default::default()
        };
        let err = service.update(anne, update).await.unwrap_err();
        assert_eq!(validation_message(err, "email"), EMAIL_TAKEN);
    }

    #[tokio::test]
    async fn test_register_creates_inactive_user_and_sends_activation() {
        let harness = setup_test_service().await;
        let user = harness
            .service
            .register(RegisterInput::new("jake", "jake@jake.jake", "jakejake1"))
            .await
            .unwrap();

        assert!(!user.is_active());
        assert_ne!(user.password_hash, "jakejake1");

        let email = harness.mailer.last().await.unwrap();
        assert_eq!(email.to, "jake@jake.jake");
        let token = token_from_link(&email, "/api/users/activate/").unwrap();
        let claims = harness.service.tokens().decode(&token).unwrap();
        assert_eq!(claims.identity.username, "jake");
    }

    #[tokio::test]
    async fn test_register_survives_mail_failure() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = UserService::new(
            SqlxUserRepository::boxed(pool),
            TokenService::from_config(&AuthConfig::default()),
            Arc::new(FailingMailer),
            EmailTemplates::new(&EmailConfig::default()),
            SocialProviders::new(),
        );

        let user = service
            .register(RegisterInput::new("jake", "jake@jake.jake", "jakejake1"))
            .await
            .unwrap();
        assert!(user.id > 0);
    }

    #[tokio::test]
    async fn test_register_duplicates_rejected() {
        let harness = setup_test_service().await;
        harness
            .service
            .register(RegisterInput::new("jake", "jake@jake.jake", "jakejake1"))
            .await
            .unwrap();

        let err = harness
            .service
            .register(RegisterInput::new("jake", "other@jake.jake", "jakejake1"))
            .await
            .unwrap_err();
        assert_eq!(validation_message(err, "username"), USERNAME_TAKEN);

        let err = harness
            .service
            .register(RegisterInput::new("other", "jake@jake.jake", "jakejake1"))
            .await
            .unwrap_err();
        assert_eq!(validation_message(err, "email"), EMAIL_TAKEN);
    }

    #[tokio::test]
    async fn test_register_invalid_password() {
        let harness = setup_test_service().await;
        let err = harness
            .service
            .register(RegisterInput::new("jake", "jake@jake.jake", "nodigits"))
            .await
            .unwrap_err();
        assert_eq!(validation_message(err, "password"), INVALID_PASSWORD);
    }

    #[tokio::test]
    async fn test_login_requires_activation() {
        let harness = setup_test_service().await;
        harness
            .service
            .register(RegisterInput::new("jake", "jake@jake.jake", "jakejake1"))
            .await
            .unwrap();

        let err = harness
            .service
            .login(LoginInput::new("jake@jake.jake", "jakejake1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), ACCOUNT_INACTIVE);
    }

    #[tokio::test]
    async fn test_login_messages() {
        let harness = setup_test_service().await;
        register_active(&harness, "jake").await;

        let cases = [
            (LoginInput::new("", "jakejake1"), EMAIL_REQUIRED),
            (LoginInput::new("jake@example.com", ""), PASSWORD_REQUIRED),
            (LoginInput::new("nobody@example.com", "jakejake1"), INVALID_CREDENTIALS),
            (LoginInput::new("jake@example.com", "wrongpass1"), INVALID_CREDENTIALS),
        ];
        for (input, expected) in cases {
            let err = harness.service.login(input).await.unwrap_err();
            assert_eq!(err.to_string(), expected);
        }

        let session = harness
            .service
            .login(LoginInput::new("jake@example.com", "jakejake1"))
            .await
            .unwrap();
        assert_eq!(session.user.username, "jake");
        let authenticated = harness.service.authenticate(&session.token).await.unwrap();
        assert_eq!(authenticated.unwrap().id, session.user.id);
    }

    #[tokio::test]
    async fn test_activation_outcomes() {
        let harness = setup_test_service().await;
        let user = harness
            .service
            .register(RegisterInput::new("jake", "jake@jake.jake", "jakejake1"))
            .await
            .unwrap();
        let token = harness.service.tokens().issue(&user).unwrap();

        assert_eq!(
            harness.service.activate(&token).await.unwrap(),
            ActivationOutcome::Activated
        );
        assert_eq!(
            harness.service.activate(&token).await.unwrap(),
            ActivationOutcome::AlreadyUsed
        );

        let ghost = User::new("ghost".into(), "ghost@example.com".into(), "h".into());
        let ghost_token = harness.service.tokens().issue(&ghost).unwrap();
        assert_eq!(
            harness.service.activate(&ghost_token).await.unwrap(),
            ActivationOutcome::Invalid
        );

        assert!(matches!(
            harness.service.activate("garbage").await,
            Err(UserServiceError::Token(TokenError::Invalid))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_ignores_inactive_users() {
        let harness = setup_test_service().await;
        let user = harness
            .service
            .register(RegisterInput::new("jake", "jake@jake.jake", "jakejake1"))
            .await
            .unwrap();
        let token = harness.service.tokens().issue(&user).unwrap();
        assert!(harness.service.authenticate(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user() {
        let harness = setup_test_service().await;
        let user = register_active(&harness, "jake").await;
        register_active(&harness, "taken").await;

        let err = harness
            .service
            .update(
                user.clone(),
                UpdateUserInput {
                    username: Some("taken".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(validation_message(err, "username"), USERNAME_TAKEN);

        let session = harness
            .service
            .update(
                user,
                UpdateUserInput {
                    username: Some("jake".to_string()),
                    bio: Some("I like to skateboard".to_string()),
                    password: Some("newpass123".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(session.user.bio.as_deref(), Some("I like to skateboard"));

        harness
            .service
            .login(LoginInput::new("jake@example.com", "newpass123"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let harness = setup_test_service().await;
        register_active(&harness, "jake").await;

        let err = harness
            .service
            .request_password_reset("nobody@example.com")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), RESET_EMAIL_UNKNOWN);

        harness
            .service
            .request_password_reset("jake@example.com")
            .await
            .unwrap();
        let email = harness.mailer.last().await.unwrap();
        assert_eq!(email.subject, "Confirmation of Password reset");
        let token = token_from_link(&email, "/api/users/reset_password/").unwrap();

        let input = ResetPasswordInput {
            email: "jake@example.com".to_string(),
            reset_token: token.clone(),
            new_password: "brandnew42".to_string(),
        };
        harness
            .service
            .complete_password_reset(input.clone())
            .await
            .unwrap();

        // The password hash changed, so the token is spent
        let err = harness
            .service
            .complete_password_reset(input)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), RESET_TOKEN_INVALID);

        harness
            .service
            .login(LoginInput::new("jake@example.com", "brandnew42"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_password_reset_rejects_short_password() {
        let harness = setup_test_service().await;
        let err = harness
            .service
            .complete_password_reset(ResetPasswordInput {
                email: "jake@example.com".to_string(),
                reset_token: "x-y".to_string(),
                new_password: "short".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_social_login_creates_then_reuses_account() {
        let harness = setup_test_service().await;

        let first = harness
            .service
            .social_login(GOOGLE, "google-token")
            .await
            .unwrap();
        assert_eq!(first.user.username, "socialwriter");
        assert!(first.user.is_active());
        assert!(!first.user.has_usable_password());
        assert_eq!(first.user.image.as_deref(), Some("https://img.example.com/s.png"));

        let second = harness
            .service
            .social_login(GOOGLE, "google-token")
            .await
            .unwrap();
        assert_eq!(second.user.id, first.user.id);
    }

    #[tokio::test]
    async fn test_social_login_errors() {
        let harness = setup_test_service().await;

        let err = harness
            .service
            .social_login("myspace", "token")
            .await
            .unwrap_err();
        assert_eq!(validation_message(err, "provider"), INVALID_PROVIDER);

        let err = harness
            .service
            .social_login(GOOGLE, "bad-token")
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::BadRequest(_)));
    }

    #[test]
    fn test_username_base() {
        assert_eq!(username_base("Social Writer"), "socialwriter");
        assert_eq!(username_base("jake.doe@example.com"), "jakedoe");
        assert_eq!(username_base("!!!"), "user");
        assert_eq!(username_base(&"x".repeat(50)).len(), 24);
    }
}
