//! Social login providers
//!
//! A provider turns an OAuth access token obtained by the client into the
//! profile behind it. Google and Facebook are supported.

use crate::config::SocialConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const GOOGLE: &str = "google-oauth2";
pub const FACEBOOK: &str = "facebook";

/// Profile data returned by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialProfile {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SocialAuthError {
    /// The provider refused the token or returned unusable data
    #[error("{0}")]
    Rejected(String),

    #[error("Failed to reach provider: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait SocialAuthProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_profile(&self, access_token: &str) -> Result<SocialProfile, SocialAuthError>;
}

/// Client shared by the providers so connections are pooled
pub fn http_client() -> Result<reqwest::Client, SocialAuthError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?)
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T, SocialAuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(provider, %status, body = %body, "Provider rejected access token");
        return Err(SocialAuthError::Rejected(format!(
            "{} rejected the access token ({})",
            provider, status
        )));
    }
    Ok(response.json::<T>().await?)
}

/// Google OAuth2 userinfo endpoint
pub struct GoogleProvider {
    client: reqwest::Client,
    userinfo_url: String,
}

impl GoogleProvider {
    pub fn new(client: reqwest::Client, userinfo_url: impl Into<String>) -> Self {
        Self {
            client,
            userinfo_url: userinfo_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[async_trait]
impl SocialAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        GOOGLE
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<SocialProfile, SocialAuthError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let info: GoogleUserInfo = read_json(GOOGLE, response).await?;

        let email = info
            .email
            .ok_or_else(|| SocialAuthError::Rejected("Google account has no email address".to_string()))?;
        Ok(SocialProfile {
            email,
            name: info.name,
            picture: info.picture,
        })
    }
}

/// Facebook Graph API `/me`
pub struct FacebookProvider {
    client: reqwest::Client,
    graph_url: String,
}

impl FacebookProvider {
    pub fn new(client: reqwest::Client, graph_url: impl Into<String>) -> Self {
        Self {
            client,
            graph_url: graph_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct FacebookMe {
    email: Option<String>,
    name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

#[async_trait]
impl SocialAuthProvider for FacebookProvider {
    fn name(&self) -> &str {
        FACEBOOK
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<SocialProfile, SocialAuthError> {
        let response = self
            .client
            .get(&self.graph_url)
            .query(&[
                ("fields", "id,name,email,picture.type(large)"),
                ("access_token", access_token),
            ])
            .send()
            .await?;
        let me: FacebookMe = read_json(FACEBOOK, response).await?;

        let email = me
            .email
            .ok_or_else(|| SocialAuthError::Rejected("Facebook account has no email address".to_string()))?;
        Ok(SocialProfile {
            email,
            name: me.name,
            picture: me.picture.and_then(|p| p.data.url),
        })
    }
}

/// Providers by name
#[derive(Clone, Default)]
pub struct SocialProviders {
    providers: HashMap<String, Arc<dyn SocialAuthProvider>>,
}

impl SocialProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Google and Facebook at the configured endpoints
    pub fn from_config(config: &SocialConfig) -> Result<Self, SocialAuthError> {
        let client = http_client()?;
        Ok(Self::new()
            .with_provider(Arc::new(GoogleProvider::new(
                client.clone(),
                &config.google_userinfo_url,
            )))
            .with_provider(Arc::new(FacebookProvider::new(
                client,
                &config.facebook_graph_url,
            ))))
    }

    pub fn with_provider(mut self, provider: Arc<dyn SocialAuthProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SocialAuthProvider>> {
        self.providers.get(name).cloned()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Accepts a fixed set of tokens
    pub struct FakeProvider {
        name: String,
        profiles: HashMap<String, SocialProfile>,
    }

    impl FakeProvider {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                profiles: HashMap::new(),
            }
        }

        pub fn with_token(mut self, token: &str, profile: SocialProfile) -> Self {
            self.profiles.insert(token.to_string(), profile);
            self
        }
    }

    #[async_trait]
    impl SocialAuthProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch_profile(&self, access_token: &str) -> Result<SocialProfile, SocialAuthError> {
            self.profiles
                .get(access_token)
                .cloned()
                .ok_or_else(|| SocialAuthError::Rejected("Invalid access token".to_string()))
        }
    }
}
