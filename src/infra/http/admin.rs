use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::info;

use crate::application::feed::FeedService;

use super::{
    DatabaseHealth, db_health,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct AdminState {
    pub feed: Arc<FeedService>,
    pub db: Arc<dyn DatabaseHealth>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/_cache/clear", post(clear_page_cache))
        .route("/_health/db", get(admin_health))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

async fn clear_page_cache(State(state): State<AdminState>) -> Response {
    state.feed.clear_page_cache();
    info!(target = "yatube::admin", "page cache cleared");
    StatusCode::NO_CONTENT.into_response()
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health(&state.db).await
}
