use serde::Serialize;

use super::UserId;

/// Identity behind the current request.
///
/// Passed explicitly into every policy, query and service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Viewer {
    Anonymous,
    User { id: UserId, username: String },
}

impl Viewer {
    pub fn user(id: UserId, username: impl Into<String>) -> Self {
        Viewer::User {
            id,
            username: username.into(),
        }
    }

    pub fn id(&self) -> Option<UserId> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User { id, .. } => Some(*id),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User { username, .. } => Some(username),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::User { .. })
    }
}
