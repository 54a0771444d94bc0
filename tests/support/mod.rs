#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::http::HeaderName;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use yatube::application::auth::Viewer;
use yatube::application::feed::{FeedService, GlobalFeed};
use yatube::application::follow::FollowService;
use yatube::application::pagination::PageWindow;
use yatube::application::posts::PostService;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, FollowsRepo, GroupsRepo, PostListScope,
    PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo,
};
use yatube::cache::{CacheConfig, PageCache};
use yatube::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use yatube::infra::http::{
    AdminState, DatabaseHealth, HttpState, ViewerConfig, build_admin_router, build_router,
};

pub const USER_HEADER: &str = "x-remote-user";
pub const LOGIN_URL: &str = "/auth/login/";

#[derive(Default)]
struct Tables {
    next_id: i64,
    ticks: i64,
    users: BTreeMap<i64, UserRecord>,
    groups: BTreeMap<i64, GroupRecord>,
    posts: BTreeMap<i64, PostRecord>,
    comments: BTreeMap<i64, CommentRecord>,
    follows: HashSet<(i64, i64)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps so insertion order is creation order.
    fn now(&mut self) -> OffsetDateTime {
        self.ticks += 1;
        OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(self.ticks)
    }

    fn in_scope(&self, post: &PostRecord, scope: PostListScope) -> bool {
        match scope {
            PostListScope::All => true,
            PostListScope::Group(group_id) => post.group_id == Some(group_id),
            PostListScope::Author(author_id) => post.author_id == author_id,
            PostListScope::FollowedBy(user_id) => {
                self.follows.contains(&(user_id, post.author_id))
            }
        }
    }

    fn scoped(&self, scope: PostListScope) -> Vec<PostRecord> {
        let mut posts: Vec<PostRecord> = self
            .posts
            .values()
            .filter(|post| self.in_scope(post, scope))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }
}

/// In-memory stand-in for every repository trait.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub async fn add_user(&self, username: &str) -> UserRecord {
        let mut tables = self.tables.lock().await;
        let user = UserRecord {
            id: tables.next_id(),
            username: username.to_string(),
            created_at: tables.now(),
        };
        tables.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut tables = self.tables.lock().await;
        let group = GroupRecord {
            id: tables.next_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("{title} description"),
        };
        tables.groups.insert(group.id, group.clone());
        group
    }

    pub async fn add_post(
        &self,
        author: &UserRecord,
        text: &str,
        group: Option<&GroupRecord>,
    ) -> PostRecord {
        self.create_post(CreatePostParams {
            author_id: author.id,
            text: text.to_string(),
            group_id: group.map(|group| group.id),
            image: None,
        })
        .await
        .expect("in-memory insert")
    }

    pub async fn add_posts(
        &self,
        author: &UserRecord,
        count: usize,
        group: Option<&GroupRecord>,
    ) -> Vec<PostRecord> {
        let mut created = Vec::with_capacity(count);
        for index in 0..count {
            created.push(self.add_post(author, &format!("post {index}"), group).await);
        }
        created
    }

    pub async fn remove_post(&self, post_id: i64) {
        self.delete_post(post_id).await.expect("post exists");
    }

    pub async fn post(&self, post_id: i64) -> Option<PostRecord> {
        self.tables.lock().await.posts.get(&post_id).cloned()
    }

    pub async fn post_count(&self) -> usize {
        self.tables.lock().await.posts.len()
    }

    pub async fn comment_count(&self) -> usize {
        self.tables.lock().await.comments.len()
    }

    pub async fn follow_count(&self) -> usize {
        self.tables.lock().await.follows.len()
    }
}

#[async_trait]
impl UsersRepo for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[i64]) -> Result<Vec<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl GroupsRepo for InMemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .groups
            .values()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.tables.lock().await.groups.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[i64]) -> Result<Vec<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.groups.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl PostsRepo for InMemoryStore {
    async fn list_posts(
        &self,
        scope: PostListScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .scoped(scope)
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.limit() as usize)
            .collect())
    }

    async fn count_posts(&self, scope: PostListScope) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.scoped(scope).len() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.tables.lock().await.posts.get(&id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = PostRecord {
            id: tables.next_id(),
            text: params.text,
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
            created_at: tables.now(),
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = tables.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.posts.remove(&id).ok_or(RepoError::NotFound)?;
        tables.comments.retain(|_, comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for InMemoryStore {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let tables = self.tables.lock().await;
        let mut comments: Vec<CommentRecord> = tables
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables.posts.contains_key(&params.post_id) {
            return Err(RepoError::InvalidInput {
                message: "comment references missing post".to_string(),
            });
        }
        let comment = CommentRecord {
            id: tables.next_id(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: tables.now(),
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for InMemoryStore {
    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .tables
            .lock()
            .await
            .follows
            .contains(&(user_id, author_id)))
    }

    async fn insert(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        if user_id == author_id {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        Ok(self
            .tables
            .lock()
            .await
            .follows
            .insert((user_id, author_id)))
    }

    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .tables
            .lock()
            .await
            .follows
            .remove(&(user_id, author_id)))
    }
}

pub struct HealthyDb;

#[async_trait]
impl DatabaseHealth for HealthyDb {
    async fn health_check(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

pub struct UnreachableDb;

#[async_trait]
impl DatabaseHealth for UnreachableDb {
    async fn health_check(&self) -> Result<(), sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }
}

/// Services wired over one shared in-memory store.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub cache: Option<Arc<PageCache<GlobalFeed>>>,
    pub feed: Arc<FeedService>,
    pub follows: Arc<FollowService>,
    pub posts: Arc<PostService>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_cache(Some(CacheConfig::default()))
    }

    pub fn without_cache() -> Self {
        Self::with_cache(None)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_cache(Some(CacheConfig {
            ttl,
            ..CacheConfig::default()
        }))
    }

    fn with_cache(config: Option<CacheConfig>) -> Self {
        let store = Arc::new(InMemoryStore::default());
        let cache = config.map(|config| Arc::new(PageCache::new(&config)));
        let feed = Arc::new(FeedService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            cache.clone(),
        ));
        let follows = Arc::new(FollowService::new(store.clone(), store.clone()));
        let posts = Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        Self {
            store,
            cache,
            feed,
            follows,
            posts,
        }
    }

    pub fn public_router(&self) -> Router {
        self.public_router_with_db(Arc::new(HealthyDb))
    }

    pub fn public_router_with_db(&self, db: Arc<dyn DatabaseHealth>) -> Router {
        build_router(HttpState {
            feed: self.feed.clone(),
            follows: self.follows.clone(),
            posts: self.posts.clone(),
            db,
            viewer: ViewerConfig {
                users: self.store.clone(),
                user_header: HeaderName::from_static(USER_HEADER),
            },
            login_url: Arc::from(LOGIN_URL),
        })
    }

    pub fn admin_router(&self) -> Router {
        build_admin_router(AdminState {
            feed: self.feed.clone(),
            db: Arc::new(HealthyDb),
        })
    }
}

pub fn viewer(user: &UserRecord) -> Viewer {
    Viewer::Authenticated(user.clone())
}
