//! Who may change what: only the author, for posts and comments alike.

use crate::domain::{Comment, CommentView, Post, PostId, PostSummary, UserId, Viewer};
use crate::error::DomainError;

/// Anything with an author.
pub trait Authored {
    fn author_id(&self) -> UserId;
}

impl Authored for Post {
    fn author_id(&self) -> UserId {
        self.author_id
    }
}

impl Authored for PostSummary {
    fn author_id(&self) -> UserId {
        self.post.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> UserId {
        self.author_id
    }
}

impl Authored for CommentView {
    fn author_id(&self) -> UserId {
        self.comment.author_id
    }
}

/// `true` iff the viewer is the entity's author. Anonymous viewers own nothing.
pub fn can_mutate<E: Authored + ?Sized>(viewer: &Viewer, entity: &E) -> bool {
    viewer.id() == Some(entity.author_id())
}

/// [`can_mutate`] as a guard. `post_id` is where a denied viewer is sent back to.
pub fn ensure_owner<E: Authored + ?Sized>(
    viewer: &Viewer,
    entity: &E,
    post_id: PostId,
) -> Result<(), DomainError> {
    if can_mutate(viewer, entity) {
        Ok(())
    } else {
        tracing::debug!(
            viewer = ?viewer.id(),
            author = entity.author_id(),
            post_id,
            "Ownership check failed"
        );
        Err(DomainError::PermissionDenied { post_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(author_id: UserId) -> Comment {
        Comment {
            id: 3,
            text: "nice post".to_string(),
            post_id: 9,
            author_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_the_author_may_mutate() {
        let c = comment(5);
        assert!(can_mutate(&Viewer::user(5, "anna"), &c));
        assert!(!can_mutate(&Viewer::user(6, "boris"), &c));
        assert!(!can_mutate(&Viewer::Anonymous, &c));
    }

    #[test]
    fn denial_points_back_at_the_post() {
        let err = ensure_owner(&Viewer::user(6, "boris"), &comment(5), 9).unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied { post_id: 9 }));
    }
}
