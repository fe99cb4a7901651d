use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    Category, CategoryId, Comment, CommentId, CommentView, Location, LocationId, NewCategory,
    NewComment, NewLocation, NewPost, NewUser, Post, PostId, PostSummary, User, UserId,
};
use crate::error::RepoError;
use crate::pagination::PageWindow;
use crate::query::PostQuery;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Overwrite an existing entity.
    async fn update(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID, applying the cascade / nullify rules.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// User repository. Deleting a user removes their posts and comments.
#[async_trait]
pub trait UserRepository: BaseRepository<User, UserId> {
    async fn insert(&self, user: NewUser) -> Result<User, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
}

/// Category repository. Deleting a category detaches its posts.
#[async_trait]
pub trait CategoryRepository: BaseRepository<Category, CategoryId> {
    async fn insert(&self, category: NewCategory) -> Result<Category, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError>;

    async fn list_published(&self) -> Result<Vec<Category>, RepoError>;
}

/// Location repository. Deleting a location detaches its posts.
#[async_trait]
pub trait LocationRepository: BaseRepository<Location, LocationId> {
    async fn insert(&self, location: NewLocation) -> Result<Location, RepoError>;

    async fn list_published(&self) -> Result<Vec<Location>, RepoError>;
}

/// Post repository. Listing methods honour every filter in the [`PostQuery`],
/// order by `pub_date` descending and annotate comment counts.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, PostId> {
    async fn insert(&self, post: NewPost) -> Result<Post, RepoError>;

    /// Number of posts the query admits.
    async fn count(&self, query: &PostQuery) -> Result<u64, RepoError>;

    /// One page of the query's ordered result.
    async fn list(
        &self,
        query: &PostQuery,
        window: PageWindow,
    ) -> Result<Vec<PostSummary>, RepoError>;

    /// First row the query admits.
    async fn find_one(&self, query: &PostQuery) -> Result<Option<PostSummary>, RepoError>;
}

/// Comment repository.
#[async_trait]
pub trait CommentRepository: BaseRepository<Comment, CommentId> {
    async fn insert(&self, comment: NewComment) -> Result<Comment, RepoError>;

    /// Comments of a post with their authors, oldest first.
    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<CommentView>, RepoError>;
}

/// The entity store as a bundle of repositories.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub locations: Arc<dyn LocationRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
}

impl Repositories {
    /// All five repositories served by one store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + CategoryRepository
            + LocationRepository
            + PostRepository
            + CommentRepository
            + 'static,
    {
        Self {
            users: store.clone(),
            categories: store.clone(),
            locations: store.clone(),
            posts: store.clone(),
            comments: store,
        }
    }
}
