//! Listing queries.
//!
//! A [`PostQuery`] describes which posts a page shows. Storage backends
//! evaluate it; the ordering (`pub_date` descending, newest id first on ties)
//! and the comment-count annotation are part of the contract of every
//! [`PostRepository`](crate::ports::PostRepository) listing method.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::domain::{Category, CategoryId, Post, PostId, User, UserId, Viewer};
use crate::policy::Visibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostQuery {
    pub visibility: Visibility,
    pub post_id: Option<PostId>,
    pub category_id: Option<CategoryId>,
    pub author_id: Option<UserId>,
}

impl PostQuery {
    /// Index, category and profile listings.
    ///
    /// Public visibility everywhere except an author looking at their own
    /// profile, who sees all of their posts. That exemption never reaches the
    /// index or category pages.
    pub fn listing(
        viewer: &Viewer,
        category: Option<&Category>,
        author: Option<&User>,
        now: DateTime<Utc>,
    ) -> Self {
        let visibility = match author {
            Some(author) if viewer.id() == Some(author.id) => Visibility::Everything,
            _ => Visibility::public(now),
        };

        Self {
            visibility,
            post_id: None,
            category_id: category.map(|c| c.id),
            author_id: author.map(|a| a.id),
        }
    }

    /// A single post as `viewer` may open it.
    pub fn detail(viewer: &Viewer, post_id: PostId, now: DateTime<Utc>) -> Self {
        Self {
            visibility: Visibility::for_viewer(viewer, now),
            post_id: Some(post_id),
            category_id: None,
            author_id: None,
        }
    }

    /// In-memory evaluation of every filter.
    pub fn matches(&self, post: &Post, category: Option<&Category>) -> bool {
        self.post_id.is_none_or(|id| post.id == id)
            && self
                .category_id
                .is_none_or(|id| post.category_id == Some(id))
            && self.author_id.is_none_or(|id| post.author_id == id)
            && self.visibility.admits(post, category)
    }

    /// Listing order: newest `pub_date` first, ties broken by newest id.
    pub fn order(a: &Post, b: &Post) -> Ordering {
        b.pub_date.cmp(&a.pub_date).then_with(|| b.id.cmp(&a.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(id: UserId) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    fn post(id: PostId, author_id: UserId, pub_date: DateTime<Utc>) -> Post {
        Post {
            id,
            title: format!("Post {id}"),
            text: "Text".to_string(),
            pub_date,
            is_published: true,
            author_id,
            location_id: None,
            category_id: None,
            image: None,
            created_at: pub_date,
        }
    }

    #[test]
    fn own_profile_lifts_visibility() {
        let now = Utc::now();
        let anna = user(1);

        let own = PostQuery::listing(&Viewer::user(1, "user1"), None, Some(&anna), now);
        assert_eq!(own.visibility, Visibility::Everything);
        assert_eq!(own.author_id, Some(1));

        let foreign = PostQuery::listing(&Viewer::user(2, "user2"), None, Some(&anna), now);
        assert_eq!(foreign.visibility, Visibility::public(now));
    }

    #[test]
    fn index_stays_public_for_authors() {
        let now = Utc::now();
        let query = PostQuery::listing(&Viewer::user(1, "user1"), None, None, now);
        assert_eq!(query.visibility, Visibility::public(now));

        let mut draft = post(1, 1, now - Duration::hours(1));
        draft.is_published = false;
        assert!(!query.matches(&draft, None));
    }

    #[test]
    fn filters_compose() {
        let now = Utc::now();
        let mut p = post(4, 2, now - Duration::hours(1));
        p.category_id = Some(3);

        let query = PostQuery {
            visibility: Visibility::public(now),
            post_id: None,
            category_id: Some(3),
            author_id: Some(2),
        };
        assert!(query.matches(&p, None));
        assert!(!PostQuery { author_id: Some(9), ..query }.matches(&p, None));
        assert!(!PostQuery { category_id: Some(8), ..query }.matches(&p, None));
    }

    #[test]
    fn order_is_newest_first() {
        let now = Utc::now();
        let mut posts = vec![
            post(1, 1, now - Duration::days(2)),
            post(2, 1, now),
            post(3, 1, now - Duration::days(2)),
        ];
        posts.sort_by(PostQuery::order);
        let ids: Vec<_> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
