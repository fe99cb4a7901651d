//! Blog service - the request handlers' business half.
//!
//! Every operation takes the [`Viewer`] explicitly, resolves what it needs
//! through the visibility filter, checks ownership before any write, and
//! returns either a view-model or a [`DomainError`] the web layer maps onto a
//! page, a redirect or a redisplayed form.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use blogicum_shared::{CommentFormData, PostFormData, ProfileFormData};

use crate::domain::{
    Category, Comment, CommentId, CommentView, Location, NewComment, Post, PostId, PostSummary,
    User, UserId, Viewer,
};
use crate::error::{DomainError, FormErrors};
use crate::forms::{self, PostInput};
use crate::pagination::{DEFAULT_PAGE_SIZE, Page, PageWindow, parse_page_number};
use crate::policy::{can_mutate, ensure_owner};
use crate::ports::{ModerationNotifier, Repositories};
use crate::query::PostQuery;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryListing {
    pub category: Category,
    pub page: Page<PostSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileListing {
    pub profile: User,
    pub page: Page<PostSummary>,
    /// The viewer is looking at their own profile.
    pub is_owner: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub post: PostSummary,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
}

/// Options for the category and location selects of the post form.
#[derive(Debug, Clone, Serialize)]
pub struct PostFormChoices {
    pub categories: Vec<Category>,
    pub locations: Vec<Location>,
}

pub struct BlogService {
    repos: Repositories,
    notifier: Arc<dyn ModerationNotifier>,
    page_size: usize,
}

impl BlogService {
    pub fn new(repos: Repositories, notifier: Arc<dyn ModerationNotifier>) -> Self {
        Self {
            repos,
            notifier,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    // ---- listings -------------------------------------------------------

    /// `GET /`
    pub async fn index(
        &self,
        viewer: &Viewer,
        page: Option<&str>,
    ) -> Result<Page<PostSummary>, DomainError> {
        let query = PostQuery::listing(viewer, None, None, now());
        self.paginate(&query, page).await
    }

    /// `GET /category/{slug}` - 404 unless the category exists and is published.
    pub async fn category_posts(
        &self,
        viewer: &Viewer,
        slug: &str,
        page: Option<&str>,
    ) -> Result<CategoryListing, DomainError> {
        let category = self
            .repos
            .categories
            .find_by_slug(slug)
            .await?
            .filter(|c| c.is_published)
            .ok_or_else(|| DomainError::not_found("Category", slug))?;

        let query = PostQuery::listing(viewer, Some(&category), None, now());
        let page = self.paginate(&query, page).await?;
        Ok(CategoryListing { category, page })
    }

    /// `GET /profile/{username}`
    pub async fn profile(
        &self,
        viewer: &Viewer,
        username: &str,
        page: Option<&str>,
    ) -> Result<ProfileListing, DomainError> {
        let profile = self
            .repos
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("User", username))?;

        let query = PostQuery::listing(viewer, None, Some(&profile), now());
        let page = self.paginate(&query, page).await?;
        let is_owner = viewer.id() == Some(profile.id);
        Ok(ProfileListing {
            profile,
            page,
            is_owner,
        })
    }

    async fn paginate(
        &self,
        query: &PostQuery,
        page: Option<&str>,
    ) -> Result<Page<PostSummary>, DomainError> {
        let total = self.repos.posts.count(query).await?;
        let window = PageWindow::resolve(total, self.page_size, parse_page_number(page));
        let items = self.repos.posts.list(query, window).await?;

        tracing::debug!(
            total,
            page = window.number,
            num_pages = window.num_pages,
            "Listing resolved"
        );
        Ok(Page::new(items, window, total))
    }

    // ---- posts ----------------------------------------------------------

    /// `GET /posts/{id}` - the post with its comments, 404 if the viewer may not see it.
    pub async fn post_detail(
        &self,
        viewer: &Viewer,
        post_id: PostId,
    ) -> Result<PostDetail, DomainError> {
        let post = self.visible_post(viewer, post_id).await?;
        let comments = self.repos.comments.list_for_post(post_id).await?;
        let can_edit = can_mutate(viewer, &post);
        Ok(PostDetail {
            post,
            comments,
            can_edit,
        })
    }

    pub async fn form_choices(&self) -> Result<PostFormChoices, DomainError> {
        Ok(PostFormChoices {
            categories: self.repos.categories.list_published().await?,
            locations: self.repos.locations.list_published().await?,
        })
    }

    /// `POST /posts/create` - the author is the viewer, whatever the form says.
    pub async fn create_post(
        &self,
        viewer: &Viewer,
        form: &PostFormData,
    ) -> Result<Post, DomainError> {
        let author_id = require_user(viewer)?;
        let input = self.validate_post_form(form).await?;

        let post = self
            .repos
            .posts
            .insert(input.into_new_post(author_id))
            .await?;
        tracing::info!(post_id = post.id, author_id, "Post created");
        Ok(post)
    }

    /// `GET /posts/{id}/edit` - the post to prefill the form with.
    pub async fn post_for_edit(&self, viewer: &Viewer, post_id: PostId) -> Result<Post, DomainError> {
        require_user(viewer)?;
        let post = self.visible_post(viewer, post_id).await?.post;
        ensure_owner(viewer, &post, post_id)?;
        Ok(post)
    }

    /// `POST /posts/{id}/edit`
    pub async fn edit_post(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        form: &PostFormData,
    ) -> Result<Post, DomainError> {
        let mut post = self.post_for_edit(viewer, post_id).await?;
        let input = self.validate_post_form(form).await?;
        input.apply_to(&mut post);

        let post = self.repos.posts.update(post).await?;
        tracing::info!(post_id, "Post updated");
        Ok(post)
    }

    /// `POST /posts/{id}/delete` - comments go with the post.
    pub async fn delete_post(&self, viewer: &Viewer, post_id: PostId) -> Result<(), DomainError> {
        let post = self.post_for_edit(viewer, post_id).await?;
        self.repos.posts.delete(post.id).await?;
        tracing::info!(post_id, "Post deleted");
        Ok(())
    }

    async fn validate_post_form(&self, form: &PostFormData) -> Result<PostInput, DomainError> {
        let mut errors = FormErrors::new();
        let input = match forms::validate_post(form) {
            Ok(input) => Some(input),
            Err(field_errors) => {
                errors.merge(field_errors);
                None
            }
        };

        if let Some(input) = &input {
            if let Some(id) = input.category_id {
                if self.repos.categories.find_by_id(id).await?.is_none() {
                    errors.add("category", "Select a valid choice.");
                }
            }
            if let Some(id) = input.location_id {
                if self.repos.locations.find_by_id(id).await?.is_none() {
                    errors.add("location", "Select a valid choice.");
                }
            }
        }

        match input {
            Some(input) if errors.is_empty() => Ok(input),
            _ => Err(DomainError::Validation(errors)),
        }
    }

    async fn visible_post(
        &self,
        viewer: &Viewer,
        post_id: PostId,
    ) -> Result<PostSummary, DomainError> {
        let query = PostQuery::detail(viewer, post_id, now());
        self.repos
            .posts
            .find_one(&query)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", post_id))
    }

    // ---- comments -------------------------------------------------------

    /// `POST /posts/{id}/comment`
    pub async fn add_comment(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        form: &CommentFormData,
    ) -> Result<Comment, DomainError> {
        let author_id = require_user(viewer)?;
        self.visible_post(viewer, post_id).await?;

        let text =
            forms::validate_comment(form, post_id, author_id, self.notifier.as_ref()).await?;
        let comment = self
            .repos
            .comments
            .insert(NewComment {
                text,
                post_id,
                author_id,
            })
            .await?;
        tracing::info!(comment_id = comment.id, post_id, author_id, "Comment added");
        Ok(comment)
    }

    /// `GET /posts/{id}/edit_comment/{cid}`
    pub async fn comment_for_edit(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        comment_id: CommentId,
    ) -> Result<Comment, DomainError> {
        require_user(viewer)?;
        self.visible_post(viewer, post_id).await?;

        let comment = self
            .repos
            .comments
            .find_by_id(comment_id)
            .await?
            .filter(|c| c.post_id == post_id)
            .ok_or_else(|| DomainError::not_found("Comment", comment_id))?;
        ensure_owner(viewer, &comment, post_id)?;
        Ok(comment)
    }

    /// `POST /posts/{id}/edit_comment/{cid}`
    pub async fn edit_comment(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        comment_id: CommentId,
        form: &CommentFormData,
    ) -> Result<Comment, DomainError> {
        let mut comment = self.comment_for_edit(viewer, post_id, comment_id).await?;
        comment.text =
            forms::validate_comment(form, post_id, comment.author_id, self.notifier.as_ref())
                .await?;

        let comment = self.repos.comments.update(comment).await?;
        tracing::info!(comment_id, post_id, "Comment updated");
        Ok(comment)
    }

    /// `POST /posts/{id}/delete_comment/{cid}`
    pub async fn delete_comment(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        comment_id: CommentId,
    ) -> Result<(), DomainError> {
        let comment = self.comment_for_edit(viewer, post_id, comment_id).await?;
        self.repos.comments.delete(comment.id).await?;
        tracing::info!(comment_id, post_id, "Comment deleted");
        Ok(())
    }

    // ---- profile --------------------------------------------------------

    /// The viewer's own account, for the profile form.
    pub async fn current_user(&self, viewer: &Viewer) -> Result<User, DomainError> {
        let id = require_user(viewer)?;
        self.repos
            .users
            .find_by_id(id)
            .await?
            // A token for a deleted account is no identity at all.
            .ok_or(DomainError::Unauthenticated)
    }

    /// `POST /edit_profile`
    pub async fn edit_profile(
        &self,
        viewer: &Viewer,
        form: &ProfileFormData,
    ) -> Result<User, DomainError> {
        let mut user = self.current_user(viewer).await?;
        let input = forms::validate_profile(form)?;

        if input.username != user.username {
            if let Some(other) = self.repos.users.find_by_username(&input.username).await? {
                if other.id != user.id {
                    return Err(FormErrors::new()
                        .with("username", "A user with that username already exists.")
                        .into());
                }
            }
        }

        user.username = input.username;
        user.email = input.email;
        user.first_name = input.first_name;
        user.last_name = input.last_name;

        let user = self.repos.users.update(user).await?;
        tracing::info!(user_id = user.id, "Profile updated");
        Ok(user)
    }
}

fn require_user(viewer: &Viewer) -> Result<UserId, DomainError> {
    viewer.id().ok_or(DomainError::Unauthenticated)
}

fn now() -> DateTime<Utc> {
    Utc::now()
}
