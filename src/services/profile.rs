//! Profile service: public profiles and the follow graph

use crate::db::repositories::{FollowRepository, UserRepository};
use crate::models::{Profile, User};
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;

pub const PROFILE_NOT_FOUND: &str = "The requested profile does not exist.";
pub const CANNOT_FOLLOW_SELF: &str = "You cannot follow yourself";
pub const CANNOT_UNFOLLOW_SELF: &str = "You cannot unfollow yourself";

#[derive(Debug, thiserror::Error)]
pub enum ProfileServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ProfileService {
    user_repo: Arc<dyn UserRepository>,
    follow_repo: Arc<dyn FollowRepository>,
}

impl ProfileService {
    pub fn new(user_repo: Arc<dyn UserRepository>, follow_repo: Arc<dyn FollowRepository>) -> Self {
        Self {
            user_repo,
            follow_repo,
        }
    }

    /// `user` as seen by `viewer`
    pub async fn profile_of(
        &self,
        user: &User,
        viewer: Option<&User>,
    ) -> Result<Profile, ProfileServiceError> {
        let following = match viewer {
            Some(viewer) if viewer.id != user.id => self
                .follow_repo
                .is_following(viewer.id, user.id)
                .await
                .context("Failed to check follow")?,
            _ => false,
        };
        Ok(Profile::from_user(user, following))
    }

    /// Which of `user_ids` `viewer` follows; nothing for anonymous viewers
    pub async fn followed_by(
        &self,
        viewer: Option<&User>,
        user_ids: &[i64],
    ) -> Result<HashSet<i64>, ProfileServiceError> {
        let Some(viewer) = viewer else {
            return Ok(HashSet::new());
        };
        Ok(self
            .follow_repo
            .followed_among(viewer.id, user_ids)
            .await
            .context("Failed to check follows")?)
    }

    pub async fn get_profile(
        &self,
        username: &str,
        viewer: Option<&User>,
    ) -> Result<Profile, ProfileServiceError> {
        let user = self.find(username).await?;
        self.profile_of(&user, viewer).await
    }

    pub async fn follow(&self, follower: &User, username: &str) -> Result<Profile, ProfileServiceError> {
        let target = self.find(username).await?;
        if target.id == follower.id {
            return Err(ProfileServiceError::BadRequest(CANNOT_FOLLOW_SELF.to_string()));
        }

        self.follow_repo
            .follow(follower.id, target.id)
            .await
            .context("Failed to follow user")?;
        tracing::debug!(follower = follower.id, followed = target.id, "Followed");

        Ok(Profile::from_user(&target, true))
    }

    pub async fn unfollow(&self, follower: &User, username: &str) -> Result<Profile, ProfileServiceError> {
        let target = self.find(username).await?;
        if target.id == follower.id {
            return Err(ProfileServiceError::BadRequest(CANNOT_UNFOLLOW_SELF.to_string()));
        }

        self.follow_repo
            .unfollow(follower.id, target.id)
            .await
            .context("Failed to unfollow user")?;
        tracing::debug!(follower = follower.id, unfollowed = target.id, "Unfollowed");

        Ok(Profile::from_user(&target, false))
    }

    /// Users following `user`; `following` tells whether `user` follows back
    pub async fn followers(&self, user: &User) -> Result<Vec<Profile>, ProfileServiceError> {
        let followers = self
            .follow_repo
            .followers(user.id)
            .await
            .context("Failed to list followers")?;

        let ids: Vec<i64> = followers.iter().map(|u| u.id).collect();
        let followed_back = self.followed_by(Some(user), &ids).await?;
        Ok(followers
            .iter()
            .map(|u| Profile::from_user(u, followed_back.contains(&u.id)))
            .collect())
    }

    /// Users `user` follows
    pub async fn following(&self, user: &User) -> Result<Vec<Profile>, ProfileServiceError> {
        let following = self
            .follow_repo
            .following(user.id)
            .await
            .context("Failed to list followed users")?;

        Ok(following.iter().map(|u| Profile::from_user(u, true)).collect())
    }

    async fn find(&self, username: &str) -> Result<User, ProfileServiceError> {
        self.user_repo
            .get_by_username(username)
            .await
            .context("Failed to load user")?
            .ok_or_else(|| ProfileServiceError::NotFound(PROFILE_NOT_FOUND.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxFollowRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (ProfileService, User, User) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let mut jake = User::new("jake".into(), "jake@jake.jake".into(), "h".into());
        jake.bio = Some(String::new());
        let jake = users.create(&jake).await.unwrap();
        let anne = users
            .create(&User::new("anne".into(), "anne@example.com".into(), "h".into()))
            .await
            .unwrap();

        let service = ProfileService::new(users, SqlxFollowRepository::boxed(pool));
        (service, jake, anne)
    }

    #[tokio::test]
    async fn test_get_profile() {
        let (service, jake, anne) = setup().await;

        let profile = service.get_profile("jake", None).await.unwrap();
        assert_eq!(profile.username, "jake");
        assert_eq!(profile.bio, None);
        assert!(!profile.following);

        service.follow(&anne, "jake").await.unwrap();
        assert!(service.get_profile("jake", Some(&anne)).await.unwrap().following);
        assert!(!service.get_profile("anne", Some(&jake)).await.unwrap().following);

        assert!(matches!(
            service.get_profile("nobody", None).await,
            Err(ProfileServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let (service, jake, _) = setup().await;
        let err = service.follow(&jake, "jake").await.unwrap_err();
        assert_eq!(err.to_string(), CANNOT_FOLLOW_SELF);
        let err = service.unfollow(&jake, "jake").await.unwrap_err();
        assert_eq!(err.to_string(), CANNOT_UNFOLLOW_SELF);
    }

    #[tokio::test]
    async fn test_follow_toggle_is_idempotent() {
        let (service, jake, anne) = setup().await;

        assert!(service.follow(&jake, "anne").await.unwrap().following);
        assert!(service.follow(&jake, "anne").await.unwrap().following);
        assert_eq!(service.following(&jake).await.unwrap().len(), 1);

        let followers = service.followers(&anne).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "jake");
        assert!(!followers[0].following);

        assert!(!service.unfollow(&jake, "anne").await.unwrap().following);
        assert!(!service.unfollow(&jake, "anne").await.unwrap().following);
        assert!(service.following(&jake).await.unwrap().is_empty());
    }
}
