//! Feed composition: the global, group, profile and follow listings plus
//! the post detail view.
//!
//! Every listing counts the scope, resolves the page window, fetches that
//! slice and hydrates authors and groups in one batch each. Only the global
//! feed goes through the page cache.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::try_join;
use tracing::debug;

use crate::application::auth::{AuthError, Viewer, require_authenticated};
use crate::application::pagination::{PAGE_SIZE, Page, PageWindow};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostListScope, PostsRepo, RepoError, UsersRepo,
};
use crate::cache::{PageCache, PageCacheKey};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::posts::post_label;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorView {
    pub id: i64,
    pub username: String,
}

impl From<&UserRecord> for AuthorView {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl From<&GroupRecord> for GroupView {
    fn from(group: &GroupRecord) -> Self {
        Self {
            id: group.id,
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: i64,
    pub label: String,
    pub text: String,
    pub author: AuthorView,
    pub group: Option<GroupView>,
    pub image: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub author: AuthorView,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalFeed {
    pub posts: Page<PostView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFeed {
    pub group: GroupView,
    pub posts: Page<PostView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileFeed {
    pub author: AuthorView,
    pub post_count: u64,
    pub is_following: bool,
    pub posts: Page<PostView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowFeed {
    pub posts: Page<PostView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostDetail {
    pub post: PostView,
    pub author: AuthorView,
    pub group: Option<GroupView>,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Composes every post listing plus the post detail view.
#[derive(Clone)]
pub struct FeedService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    cache: Option<Arc<PageCache<GlobalFeed>>>,
}

impl FeedService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        cache: Option<Arc<PageCache<GlobalFeed>>>,
    ) -> Self {
        Self {
            users,
            groups,
            posts,
            comments,
            follows,
            cache,
        }
    }

    /// All posts, newest first. Served from the page cache when one is configured.
    pub async fn list_global(&self, page: u32) -> Result<GlobalFeed, FeedError> {
        let key = PageCacheKey::GlobalFeed { page };
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            return Ok(cached);
        }

        let feed = GlobalFeed {
            posts: self.compose(PostListScope::All, page).await?,
        };

        if let Some(cache) = &self.cache {
            cache.insert(key, feed.clone());
        }
        Ok(feed)
    }

    pub async fn list_by_group(&self, slug: &str, page: u32) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::NotFound { entity: "group" })?;

        let posts = self.compose(PostListScope::Group(group.id), page).await?;
        Ok(GroupFeed {
            group: GroupView::from(&group),
            posts,
        })
    }

    pub async fn list_by_profile(
        &self,
        username: &str,
        viewer: &Viewer,
        page: u32,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::NotFound { entity: "author" })?;

        let scope = PostListScope::Author(author.id);
        let posts = self.compose(scope, page).await?;

        let is_following = match viewer.user_id() {
            Some(viewer_id) if viewer_id != author.id => {
                self.follows.exists(viewer_id, author.id).await?
            }
            _ => false,
        };

        Ok(ProfileFeed {
            author: AuthorView::from(&author),
            post_count: posts.total_items,
            is_following,
            posts,
        })
    }

    /// Posts by every author the viewer follows.
    pub async fn list_follow_feed(&self, viewer: &Viewer, page: u32) -> Result<FollowFeed, FeedError> {
        let user = require_authenticated(viewer)?;
        let posts = self.compose(PostListScope::FollowedBy(user.id), page).await?;
        Ok(FollowFeed { posts })
    }

    pub async fn post_detail(&self, post_id: i64) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(FeedError::NotFound { entity: "post" })?;

        let comments = self.comments.list_for_post(post.id).await?;

        let mut user_ids: Vec<i64> = comments.iter().map(|comment| comment.author_id).collect();
        user_ids.push(post.author_id);
        let (authors, groups) = try_join!(
            self.load_users(&user_ids),
            self.load_groups(post.group_id.as_slice())
        )?;

        let view = hydrate_post(&post, &authors, &groups)?;
        let author_post_count = self
            .posts
            .count_posts(PostListScope::Author(post.author_id))
            .await?;
        let comments = comments
            .iter()
            .map(|comment| hydrate_comment(comment, &authors))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PostDetail {
            author: view.author.clone(),
            group: view.group.clone(),
            post: view,
            author_post_count,
            comments,
        })
    }

    /// Drop every cached feed page.
    pub fn clear_page_cache(&self) {
        match &self.cache {
            Some(cache) => cache.clear_all(),
            None => debug!("page cache disabled; nothing to clear"),
        }
    }

    async fn compose(&self, scope: PostListScope, page: u32) -> Result<Page<PostView>, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let window = PageWindow::resolve(total, PAGE_SIZE, page);
        let records = if total == 0 {
            Vec::new()
        } else {
            self.posts.list_posts(scope, window).await?
        };

        let author_ids: Vec<i64> = records.iter().map(|post| post.author_id).collect();
        let group_ids: Vec<i64> = records.iter().filter_map(|post| post.group_id).collect();
        let (authors, groups) =
            try_join!(self.load_users(&author_ids), self.load_groups(&group_ids))?;

        let items = records
            .iter()
            .map(|post| hydrate_post(post, &authors, &groups))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_window(window, items))
    }

    async fn load_users(&self, ids: &[i64]) -> Result<HashMap<i64, UserRecord>, RepoError> {
        let ids = dedup(ids);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users = self.users.find_many(&ids).await?;
        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }

    async fn load_groups(&self, ids: &[i64]) -> Result<HashMap<i64, GroupRecord>, RepoError> {
        let ids = dedup(ids);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let groups = self.groups.find_many(&ids).await?;
        Ok(groups.into_iter().map(|group| (group.id, group)).collect())
    }
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn hydrate_post(
    post: &PostRecord,
    authors: &HashMap<i64, UserRecord>,
    groups: &HashMap<i64, GroupRecord>,
) -> Result<PostView, RepoError> {
    let author = authors.get(&post.author_id).ok_or_else(|| RepoError::Integrity {
        message: format!("post {} references missing author {}", post.id, post.author_id),
    })?;
    let group = match post.group_id {
        Some(group_id) => Some(groups.get(&group_id).ok_or_else(|| RepoError::Integrity {
            message: format!("post {} references missing group {group_id}", post.id),
        })?),
        None => None,
    };

    Ok(PostView {
        id: post.id,
        label: post_label(&post.text).to_string(),
        text: post.text.clone(),
        author: AuthorView::from(author),
        group: group.map(GroupView::from),
        image: post.image.clone(),
        created_at: format_timestamp(post.created_at),
    })
}

fn hydrate_comment(
    comment: &CommentRecord,
    authors: &HashMap<i64, UserRecord>,
) -> Result<CommentView, RepoError> {
    let author = authors
        .get(&comment.author_id)
        .ok_or_else(|| RepoError::Integrity {
            message: format!(
                "comment {} references missing author {}",
                comment.id, comment.author_id
            ),
        })?;
    Ok(CommentView {
        id: comment.id,
        author: AuthorView::from(author),
        text: comment.text.clone(),
        created_at: format_timestamp(comment.created_at),
    })
}

fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.to_string())
}
