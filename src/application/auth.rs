//! Request identity as supplied by the upstream identity provider.

use thiserror::Error;

use crate::domain::entities::UserRecord;

/// The identity behind a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Anonymous,
    Authenticated(UserRecord),
}

impl Viewer {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::Authenticated(_))
    }

    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            Viewer::Authenticated(user) => Some(user),
            Viewer::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user().map(|user| user.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthorized,
}

/// Guard for operations that need a signed-in user.
pub fn require_authenticated(viewer: &Viewer) -> Result<&UserRecord, AuthError> {
    viewer.user().ok_or(AuthError::Unauthorized)
}
