//! Which posts a viewer may see.
//!
//! A post is public when it is published, dated no later than now, and its
//! category (if it has one) is published. Its author sees it regardless.
//!
//! The rule is carried around as a [`Visibility`] value rather than a closure
//! so storage backends can translate it into their own filter language and
//! count / slice the admitted rows without post-filtering each page.

use chrono::{DateTime, Utc};

use crate::domain::{Category, Post, PostSummary, UserId, Viewer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// No restriction. Only an author browsing their own profile gets this.
    Everything,
    /// The public rule.
    Public { now: DateTime<Utc> },
    /// The public rule, plus everything written by `author_id`.
    PublicOrAuthoredBy {
        author_id: UserId,
        now: DateTime<Utc>,
    },
}

impl Visibility {
    pub fn public(now: DateTime<Utc>) -> Self {
        Visibility::Public { now }
    }

    /// What `viewer` may open directly (detail pages, comment targets).
    pub fn for_viewer(viewer: &Viewer, now: DateTime<Utc>) -> Self {
        match viewer.id() {
            Some(author_id) => Visibility::PublicOrAuthoredBy { author_id, now },
            None => Visibility::Public { now },
        }
    }

    /// In-memory evaluation. `category` is the post's category row, if any.
    pub fn admits(&self, post: &Post, category: Option<&Category>) -> bool {
        match *self {
            Visibility::Everything => true,
            Visibility::Public { now } => is_public(post, category, now),
            Visibility::PublicOrAuthoredBy { author_id, now } => {
                post.author_id == author_id || is_public(post, category, now)
            }
        }
    }
}

/// The public rule. A post without a category passes the category check.
pub fn is_public(post: &Post, category: Option<&Category>, now: DateTime<Utc>) -> bool {
    post.is_published && category.is_none_or(|c| c.is_published) && post.pub_date <= now
}

pub fn is_visible(
    viewer: &Viewer,
    post: &Post,
    category: Option<&Category>,
    now: DateTime<Utc>,
) -> bool {
    Visibility::for_viewer(viewer, now).admits(post, category)
}

/// The subset of `posts` that `viewer` may see, order preserved.
pub fn visible_posts(
    viewer: &Viewer,
    mut posts: Vec<PostSummary>,
    now: DateTime<Utc>,
) -> Vec<PostSummary> {
    let visibility = Visibility::for_viewer(viewer, now);
    posts.retain(|row| visibility.admits(&row.post, row.category.as_ref()));
    posts
}
