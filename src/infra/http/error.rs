use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use serde_json::json;
use url::form_urlencoded;

use crate::application::error::HttpError;
use crate::application::feed::FeedError;
use crate::application::follow::FollowError;
use crate::application::posts::PostError;

use super::repo_error_to_http;

/// Redirect target for an anonymous visitor hitting a guarded path.
pub fn login_redirect(login_url: &str, next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    // Keep path separators readable in the `next` parameter.
    let encoded = encoded.replace("%2F", "/");
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{separator}next={encoded}")
}

/// Redirect sent to an anonymous visitor before a guarded request is parsed.
pub fn login_required(login_url: &str, path: &str) -> HttpError {
    unauthorized("infra::http::login_required", login_url, path)
}

/// A malformed or mistyped form body, reported only once the viewer is known.
pub fn form_rejection_to_http(rejection: FormRejection) -> HttpError {
    HttpError::new(
        "infra::http::form_rejection_to_http",
        rejection.status(),
        "Request could not be processed",
        rejection.body_text(),
    )
}

fn unauthorized(source: &'static str, login_url: &str, path: &str) -> HttpError {
    HttpError::redirect(
        source,
        login_redirect(login_url, path),
        format!("anonymous request to guarded path {path}"),
    )
}

fn not_found(source: &'static str, entity: &str) -> HttpError {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Not found",
        format!("{entity} not found"),
    )
}

pub fn feed_error_to_http(err: FeedError, login_url: &str, path: &str) -> HttpError {
    const SOURCE: &str = "infra::http::feed_error_to_http";
    match err {
        FeedError::NotFound { entity } => not_found(SOURCE, entity),
        FeedError::Unauthorized(_) => unauthorized(SOURCE, login_url, path),
        FeedError::Repo(err) => repo_error_to_http(SOURCE, err),
    }
}

pub fn post_error_to_http(err: PostError, login_url: &str, path: &str) -> HttpError {
    const SOURCE: &str = "infra::http::post_error_to_http";
    match err {
        PostError::Unauthorized(_) => unauthorized(SOURCE, login_url, path),
        PostError::NotFound { entity } => not_found(SOURCE, entity),
        PostError::Forbidden { post_id } => HttpError::redirect(
            SOURCE,
            format!("/posts/{post_id}/"),
            format!("post {post_id} is owned by another author"),
        ),
        PostError::Validation(errors) => {
            let detail = errors.to_string();
            HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                detail,
            )
            .with_details(json!(errors.errors))
        }
        PostError::Repo(err) => repo_error_to_http(SOURCE, err),
    }
}

/// The unfollow handler redirects on `FollowError::NotFound` before calling this.
pub fn follow_error_to_http(err: FollowError, login_url: &str, path: &str) -> HttpError {
    const SOURCE: &str = "infra::http::follow_error_to_http";
    match err {
        FollowError::Unauthorized(_) => unauthorized(SOURCE, login_url, path),
        FollowError::UnknownAuthor { username } => not_found(SOURCE, &format!("author `{username}`")),
        FollowError::NotFound => not_found(SOURCE, "follow edge"),
        FollowError::Repo(err) => repo_error_to_http(SOURCE, err),
    }
}
