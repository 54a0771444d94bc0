//! Post authoring: create, edit, comment, delete.
//!
//! None of these operations touch the page cache; the global feed keeps
//! serving what it already holds until expiry or an explicit clear.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::application::auth::{AuthError, Viewer, require_authenticated};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, PostRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::{normalize_image, validate_text};

#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentForm {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Field-level validation failures, reported back to the form renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field == field)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("post {post_id} belongs to another author")]
    Forbidden { post_id: i64 },
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct PostService {
    groups: Arc<dyn GroupsRepo>,
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
}

struct ValidPost {
    text: String,
    group_id: Option<i64>,
    image: Option<String>,
}

impl PostService {
    pub fn new(
        groups: Arc<dyn GroupsRepo>,
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            groups,
            reader,
            writer,
            comments,
        }
    }

    pub async fn create_post(&self, viewer: &Viewer, form: PostForm) -> Result<PostRecord, PostError> {
        let author = require_authenticated(viewer)?;
        let valid = self.validate(form).await?;

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text: valid.text,
                group_id: valid.group_id,
                image: valid.image,
            })
            .await?;

        info!(post_id = post.id, author_id = author.id, "post created");
        Ok(post)
    }

    pub async fn edit_post(
        &self,
        viewer: &Viewer,
        post_id: i64,
        form: PostForm,
    ) -> Result<PostRecord, PostError> {
        let author = require_authenticated(viewer)?;
        self.load_owned(author, post_id).await?;
        let valid = self.validate(form).await?;

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id: post_id,
                text: valid.text,
                group_id: valid.group_id,
                image: valid.image,
            })
            .await?;

        info!(post_id, author_id = author.id, "post updated");
        Ok(post)
    }

    pub async fn add_comment(
        &self,
        viewer: &Viewer,
        post_id: i64,
        form: CommentForm,
    ) -> Result<CommentRecord, PostError> {
        let author = require_authenticated(viewer)?;
        let post = self
            .reader
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound { entity: "post" })?;

        let mut errors = ValidationErrors::default();
        let text = match validate_text("text", &form.text) {
            Ok(text) => text,
            Err(err) => {
                errors.push("text", domain_message(err));
                return Err(PostError::Validation(errors));
            }
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text,
            })
            .await?;

        info!(post_id, comment_id = comment.id, "comment added");
        Ok(comment)
    }

    /// Remove a post together with its comments.
    pub async fn delete_post(&self, viewer: &Viewer, post_id: i64) -> Result<(), PostError> {
        let author = require_authenticated(viewer)?;
        self.load_owned(author, post_id).await?;
        self.writer.delete_post(post_id).await?;
        info!(post_id, author_id = author.id, "post deleted");
        Ok(())
    }

    async fn load_owned(&self, author: &UserRecord, post_id: i64) -> Result<PostRecord, PostError> {
        let post = self
            .reader
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound { entity: "post" })?;
        if post.author_id != author.id {
            return Err(PostError::Forbidden { post_id });
        }
        Ok(post)
    }

    async fn validate(&self, form: PostForm) -> Result<ValidPost, PostError> {
        let mut errors = ValidationErrors::default();

        let text = match validate_text("text", &form.text) {
            Ok(text) => Some(text),
            Err(err) => {
                errors.push("text", domain_message(err));
                None
            }
        };

        if let Some(group_id) = form.group_id {
            if self.groups.find_by_id(group_id).await?.is_none() {
                errors.push("group", format!("group {group_id} does not exist"));
            }
        }

        match text {
            Some(text) if errors.is_empty() => Ok(ValidPost {
                text,
                group_id: form.group_id,
                image: normalize_image(form.image.as_deref()),
            }),
            _ => Err(PostError::Validation(errors)),
        }
    }
}

fn domain_message(err: DomainError) -> String {
    match err {
        DomainError::Validation { message } => message,
        other => other.to_string(),
    }
}
