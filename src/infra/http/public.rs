use std::sync::Arc;

use axum::{
    Extension, Form, Json, Router,
    extract::{Path, Query, State, rejection::FormRejection},
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::debug;

use crate::application::{
    auth::{Viewer, require_authenticated},
    error::HttpError,
    feed::{FeedService, FollowFeed, GlobalFeed, GroupFeed, PostDetail, ProfileFeed},
    follow::{FollowError, FollowService},
    pagination::parse_page_number,
    posts::{CommentForm, PostForm, PostService, ValidationErrors},
};
use crate::domain::entities::UserRecord;

use super::{
    DatabaseHealth, db_health,
    error::{
        feed_error_to_http, follow_error_to_http, form_rejection_to_http, login_required,
        post_error_to_http,
    },
    middleware::{log_responses, set_request_context},
    viewer::{ViewerConfig, resolve_viewer},
};

const SOURCE: &str = "infra::http::public";

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub follows: Arc<FollowService>,
    pub posts: Arc<PostService>,
    pub db: Arc<dyn DatabaseHealth>,
    pub viewer: ViewerConfig,
    pub login_url: Arc<str>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", post(profile_follow))
        .route("/profile/{username}/unfollow/", post(profile_unfollow))
        .route("/follow/", get(follow_index))
        .route("/create/", post(post_create))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/edit/", post(post_edit))
        .route("/posts/{id}/delete/", post(post_delete))
        .route("/posts/{id}/comment/", post(add_comment))
        .route("/_health/db", get(public_health))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.viewer.clone(),
            resolve_viewer,
        ))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn number(&self) -> u32 {
        parse_page_number(self.page.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostFormPayload {
    text: String,
    group: Option<String>,
    image: Option<String>,
}

impl PostFormPayload {
    /// Blank `group` means "no group"; anything else must be a group id.
    fn into_form(self) -> Result<PostForm, HttpError> {
        let group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                let mut errors = ValidationErrors::default();
                errors.push("group", format!("`{raw}` is not a valid group id"));
                invalid_form(errors)
            })?),
        };
        Ok(PostForm {
            text: self.text,
            group_id,
            image: self.image,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentFormPayload {
    text: String,
}

fn invalid_form(errors: ValidationErrors) -> HttpError {
    HttpError::new(
        SOURCE,
        StatusCode::BAD_REQUEST,
        "Request could not be processed",
        errors.to_string(),
    )
    .with_details(serde_json::json!(errors.errors))
}

fn parse_post_id(raw: &str) -> Result<i64, HttpError> {
    raw.parse::<i64>().map_err(|_| {
        HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Not found",
            format!("`{raw}` is not a post id"),
        )
    })
}

fn post_detail_path(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

fn profile_path(username: &str) -> String {
    format!("/profile/{username}/")
}

/// Login check for guarded routes; runs before the path or body is parsed.
fn signed_in<'a>(
    state: &HttpState,
    viewer: &'a Viewer,
    uri: &Uri,
) -> Result<&'a UserRecord, HttpError> {
    require_authenticated(viewer).map_err(|_| login_required(&state.login_url, uri.path()))
}

async fn index(
    State(state): State<HttpState>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<GlobalFeed>, HttpError> {
    state
        .feed
        .list_global(query.number())
        .await
        .map(Json)
        .map_err(|err| feed_error_to_http(err, &state.login_url, uri.path()))
}

async fn group_posts(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<GroupFeed>, HttpError> {
    state
        .feed
        .list_by_group(&slug, query.number())
        .await
        .map(Json)
        .map_err(|err| feed_error_to_http(err, &state.login_url, uri.path()))
}

async fn profile(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<ProfileFeed>, HttpError> {
    state
        .feed
        .list_by_profile(&username, &viewer, query.number())
        .await
        .map(Json)
        .map_err(|err| feed_error_to_http(err, &state.login_url, uri.path()))
}

async fn follow_index(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<FollowFeed>, HttpError> {
    state
        .feed
        .list_follow_feed(&viewer, query.number())
        .await
        .map(Json)
        .map_err(|err| feed_error_to_http(err, &state.login_url, uri.path()))
}

async fn post_detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<Json<PostDetail>, HttpError> {
    let post_id = parse_post_id(&id)?;
    state
        .feed
        .post_detail(post_id)
        .await
        .map(Json)
        .map_err(|err| feed_error_to_http(err, &state.login_url, uri.path()))
}

async fn post_create(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    uri: Uri,
    form: Result<Form<PostFormPayload>, FormRejection>,
) -> Result<Redirect, HttpError> {
    let author = signed_in(&state, &viewer, &uri)?;
    let Form(payload) = form.map_err(form_rejection_to_http)?;
    let form = payload.into_form()?;
    state
        .posts
        .create_post(&viewer, form)
        .await
        .map_err(|err| post_error_to_http(err, &state.login_url, uri.path()))?;

    Ok(Redirect::to(&profile_path(&author.username)))
}

async fn post_edit(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    uri: Uri,
    form: Result<Form<PostFormPayload>, FormRejection>,
) -> Result<Redirect, HttpError> {
    signed_in(&state, &viewer, &uri)?;
    let post_id = parse_post_id(&id)?;
    let Form(payload) = form.map_err(form_rejection_to_http)?;
    let form = payload.into_form()?;
    state
        .posts
        .edit_post(&viewer, post_id, form)
        .await
        .map_err(|err| post_error_to_http(err, &state.login_url, uri.path()))?;
    Ok(Redirect::to(&post_detail_path(post_id)))
}

async fn post_delete(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<Redirect, HttpError> {
    let author = signed_in(&state, &viewer, &uri)?;
    let post_id = parse_post_id(&id)?;
    state
        .posts
        .delete_post(&viewer, post_id)
        .await
        .map_err(|err| post_error_to_http(err, &state.login_url, uri.path()))?;

    Ok(Redirect::to(&profile_path(&author.username)))
}

async fn add_comment(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    uri: Uri,
    form: Result<Form<CommentFormPayload>, FormRejection>,
) -> Result<Redirect, HttpError> {
    signed_in(&state, &viewer, &uri)?;
    let post_id = parse_post_id(&id)?;
    let Form(payload) = form.map_err(form_rejection_to_http)?;
    state
        .posts
        .add_comment(&viewer, post_id, CommentForm { text: payload.text })
        .await
        .map_err(|err| post_error_to_http(err, &state.login_url, uri.path()))?;
    Ok(Redirect::to(&post_detail_path(post_id)))
}

async fn profile_follow(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
    uri: Uri,
) -> Result<Redirect, HttpError> {
    state
        .follows
        .follow_username(&viewer, &username)
        .await
        .map_err(|err| follow_error_to_http(err, &state.login_url, uri.path()))?;
    Ok(Redirect::to("/follow/"))
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(username): Path<String>,
    uri: Uri,
) -> Result<Redirect, HttpError> {
    match state.follows.unfollow_username(&viewer, &username).await {
        Ok(()) => Ok(Redirect::to("/follow/")),
        Err(FollowError::NotFound) => {
            debug!(author = %username, "unfollow without an existing edge");
            Ok(Redirect::to("/follow/"))
        }
        Err(err) => Err(follow_error_to_http(err, &state.login_url, uri.path())),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health(&state.db).await
}

async fn not_found(uri: Uri) -> Response {
    HttpError::new(
        SOURCE,
        StatusCode::NOT_FOUND,
        "Not found",
        format!("no route for {}", uri.path()),
    )
    .into_response()
}
