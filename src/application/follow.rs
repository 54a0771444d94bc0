//! Subscriber → author edges.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::auth::{AuthError, Viewer, require_authenticated};
use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    /// Already following, or an attempt to follow oneself.
    Unchanged,
}

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("no follow edge to remove")]
    NotFound,
    #[error("author `{username}` not found")]
    UnknownAuthor { username: String },
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    pub async fn follow(&self, subscriber: i64, author: i64) -> Result<FollowOutcome, FollowError> {
        if subscriber == author {
            debug!(user_id = subscriber, "ignoring self-follow");
            return Ok(FollowOutcome::Unchanged);
        }

        if self.follows.insert(subscriber, author).await? {
            info!(user_id = subscriber, author_id = author, "follow created");
            Ok(FollowOutcome::Created)
        } else {
            Ok(FollowOutcome::Unchanged)
        }
    }

    pub async fn unfollow(&self, subscriber: i64, author: i64) -> Result<(), FollowError> {
        if self.follows.delete(subscriber, author).await? {
            info!(user_id = subscriber, author_id = author, "follow removed");
            Ok(())
        } else {
            Err(FollowError::NotFound)
        }
    }

    pub async fn is_following(&self, subscriber: i64, author: i64) -> Result<bool, FollowError> {
        if subscriber == author {
            return Ok(false);
        }
        Ok(self.follows.exists(subscriber, author).await?)
    }

    pub async fn follow_username(
        &self,
        viewer: &Viewer,
        username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let subscriber = require_authenticated(viewer)?;
        let author = self.resolve_author(username).await?;
        self.follow(subscriber.id, author.id).await
    }

    pub async fn unfollow_username(&self, viewer: &Viewer, username: &str) -> Result<(), FollowError> {
        let subscriber = require_authenticated(viewer)?;
        let author = self.resolve_author(username).await?;
        self.unfollow(subscriber.id, author.id).await
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor {
                username: username.to_string(),
            })
    }
}
