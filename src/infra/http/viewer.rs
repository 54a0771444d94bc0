//! Resolves the upstream identity header into a [`Viewer`].

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::application::auth::Viewer;
use crate::application::repos::UsersRepo;

#[derive(Clone)]
pub struct ViewerConfig {
    pub users: Arc<dyn UsersRepo>,
    pub user_header: HeaderName,
}

/// Attach the request's [`Viewer`] to both the request and the response extensions.
///
/// Anything short of a known username resolves to [`Viewer::Anonymous`];
/// lookup failures are logged.
pub async fn resolve_viewer(
    State(config): State<ViewerConfig>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let username = request
        .headers()
        .get(&config.user_header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let viewer = match username {
        Some(username) => match config.users.find_by_username(&username).await {
            Ok(Some(user)) => Viewer::Authenticated(user),
            Ok(None) => {
                debug!(username = %username, "identity header names unknown user");
                Viewer::Anonymous
            }
            Err(err) => {
                warn!(username = %username, error = %err, "viewer lookup failed");
                Viewer::Anonymous
            }
        },
        None => Viewer::Anonymous,
    };

    request.extensions_mut().insert(viewer.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(viewer);
    response
}
