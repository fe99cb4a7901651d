use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, CategoryId, Location, LocationId, User, UserId};

pub type PostId = i64;

/// Post entity - a blog publication.
///
/// `pub_date` may lie in the future; that is how posts are scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub author_id: UserId,
    pub location_id: Option<LocationId>,
    pub category_id: Option<CategoryId>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`Post`]. The author always comes from the session.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub author_id: UserId,
    pub location_id: Option<LocationId>,
    pub category_id: Option<CategoryId>,
    pub image: Option<String>,
}

impl NewPost {
    /// A published, uncategorized post dated now.
    pub fn new(author_id: UserId, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            pub_date: Utc::now(),
            is_published: true,
            author_id,
            location_id: None,
            category_id: None,
            image: None,
        }
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn at_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn published_at(mut self, pub_date: DateTime<Utc>) -> Self {
        self.pub_date = pub_date;
        self
    }

    pub fn draft(mut self) -> Self {
        self.is_published = false;
        self
    }
}

/// A listing row: the post with its relations prefetched and its comment
/// count annotated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub author: User,
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub comment_count: u64,
}
