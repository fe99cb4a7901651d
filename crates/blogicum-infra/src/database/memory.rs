//! In-memory entity store - used when no database is configured, and in tests.
//!
//! Enforces the same rules the Postgres schema does: unique usernames and
//! category slugs, foreign keys on insert, cascade on author / post removal,
//! and detaching posts from removed categories and locations.
//! Note: Data is lost on process restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use blogicum_core::domain::{
    Category, CategoryId, Comment, CommentId, CommentView, Location, LocationId, NewCategory,
    NewComment, NewLocation, NewPost, NewUser, Post, PostId, PostSummary, User, UserId,
};
use blogicum_core::error::RepoError;
use blogicum_core::pagination::PageWindow;
use blogicum_core::ports::{
    BaseRepository, CategoryRepository, CommentRepository, LocationRepository, PostRepository,
    UserRepository,
};
use blogicum_core::query::PostQuery;

#[derive(Default)]
struct Sequences {
    users: i64,
    categories: i64,
    locations: i64,
    posts: i64,
    comments: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    locations: BTreeMap<LocationId, Location>,
    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
    seq: Sequences,
}

impl Tables {
    fn category_of(&self, post: &Post) -> Option<&Category> {
        post.category_id.and_then(|id| self.categories.get(&id))
    }

    /// Rows admitted by `query`, in listing order.
    fn select(&self, query: &PostQuery) -> Vec<&Post> {
        let mut rows: Vec<&Post> = self
            .posts
            .values()
            .filter(|post| query.matches(post, self.category_of(post)))
            .collect();
        rows.sort_by(|a, b| PostQuery::order(a, b));
        rows
    }

    fn summarize(&self, post: &Post) -> Result<PostSummary, RepoError> {
        let author = self.users.get(&post.author_id).cloned().ok_or_else(|| {
            RepoError::Query(format!("post {} has no author row", post.id))
        })?;

        Ok(PostSummary {
            post: post.clone(),
            author,
            category: self.category_of(post).cloned(),
            location: post.location_id.and_then(|id| self.locations.get(&id)).cloned(),
            comment_count: self
                .comments
                .values()
                .filter(|c| c.post_id == post.id)
                .count() as u64,
        })
    }

    fn check_post_refs(&self, post: &Post) -> Result<(), RepoError> {
        if !self.users.contains_key(&post.author_id) {
            return Err(RepoError::Constraint("post author does not exist".to_string()));
        }
        if post
            .category_id
            .is_some_and(|id| !self.categories.contains_key(&id))
        {
            return Err(RepoError::Constraint("post category does not exist".to_string()));
        }
        if post
            .location_id
            .is_some_and(|id| !self.locations.contains_key(&id))
        {
            return Err(RepoError::Constraint("post location does not exist".to_string()));
        }
        Ok(())
    }

    fn username_taken(&self, username: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn slug_taken(&self, slug: &str, except: Option<CategoryId>) -> bool {
        self.categories
            .values()
            .any(|c| c.slug == slug && Some(c.id) != except)
    }

    fn remove_post(&mut self, id: PostId) -> bool {
        let removed = self.posts.remove(&id).is_some();
        if removed {
            self.comments.retain(|_, c| c.post_id != id);
        }
        removed
    }
}

/// In-memory entity store using ordered maps behind an async RwLock.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---- users ------------------------------------------------------------------

#[async_trait]
impl BaseRepository<User, UserId> for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepoError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn update(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(RepoError::NotFound);
        }
        if tables.username_taken(&user.username, Some(user.id)) {
            return Err(RepoError::Constraint("username already exists".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }

        let owned: Vec<PostId> = tables
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in &owned {
            tables.remove_post(*post_id);
        }
        tables.comments.retain(|_, c| c.author_id != id);

        tracing::debug!(user_id = id, posts = owned.len(), "User removed with cascade");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.username_taken(&user.username, None) {
            return Err(RepoError::Constraint("username already exists".to_string()));
        }

        let user = User {
            id: next(&mut tables.seq.users),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
}

// ---- categories -------------------------------------------------------------

#[async_trait]
impl BaseRepository<Category, CategoryId> for InMemoryStore {
    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepoError> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn update(&self, category: Category) -> Result<Category, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&category.id) {
            return Err(RepoError::NotFound);
        }
        if tables.slug_taken(&category.slug, Some(category.id)) {
            return Err(RepoError::Constraint("slug already exists".to_string()));
        }
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn delete(&self, id: CategoryId) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if tables.categories.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        for post in tables.posts.values_mut() {
            if post.category_id == Some(id) {
                post.category_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryStore {
    async fn insert(&self, category: NewCategory) -> Result<Category, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(&category.slug, None) {
            return Err(RepoError::Constraint("slug already exists".to_string()));
        }

        let category = Category {
            id: next(&mut tables.seq.categories),
            title: category.title,
            description: category.description,
            slug: category.slug,
            is_published: category.is_published,
            created_at: Utc::now(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn list_published(&self) -> Result<Vec<Category>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .values()
            .filter(|c| c.is_published)
            .cloned()
            .collect())
    }
}

// ---- locations --------------------------------------------------------------

#[async_trait]
impl BaseRepository<Location, LocationId> for InMemoryStore {
    async fn find_by_id(&self, id: LocationId) -> Result<Option<Location>, RepoError> {
        Ok(self.tables.read().await.locations.get(&id).cloned())
    }

    async fn update(&self, location: Location) -> Result<Location, RepoError> {
        let mut tables = self.tables.write().await;
        match tables.locations.get_mut(&location.id) {
            Some(row) => {
                *row = location.clone();
                Ok(location)
            }
            None => Err(RepoError::NotFound),
        }
    }

    async fn delete(&self, id: LocationId) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if tables.locations.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        for post in tables.posts.values_mut() {
            if post.location_id == Some(id) {
                post.location_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LocationRepository for InMemoryStore {
    async fn insert(&self, location: NewLocation) -> Result<Location, RepoError> {
        let mut tables = self.tables.write().await;
        let location = Location {
            id: next(&mut tables.seq.locations),
            name: location.name,
            is_published: location.is_published,
            created_at: Utc::now(),
        };
        tables.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn list_published(&self) -> Result<Vec<Location>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .locations
            .values()
            .filter(|l| l.is_published)
            .cloned()
            .collect())
    }
}

// ---- posts ------------------------------------------------------------------

#[async_trait]
impl BaseRepository<Post, PostId> for InMemoryStore {
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepoError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn update(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&post.id) {
            return Err(RepoError::NotFound);
        }
        tables.check_post_refs(&post)?;
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn delete(&self, id: PostId) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if tables.remove_post(id) {
            Ok(())
        } else {
            Err(RepoError::NotFound)
        }
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn insert(&self, post: NewPost) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        let post = Post {
            id: tables.seq.posts + 1,
            title: post.title,
            text: post.text,
            pub_date: post.pub_date,
            is_published: post.is_published,
            author_id: post.author_id,
            location_id: post.location_id,
            category_id: post.category_id,
            image: post.image,
            created_at: Utc::now(),
        };
        tables.check_post_refs(&post)?;

        tables.seq.posts = post.id;
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn count(&self, query: &PostQuery) -> Result<u64, RepoError> {
        Ok(self.tables.read().await.select(query).len() as u64)
    }

    async fn list(
        &self,
        query: &PostQuery,
        window: PageWindow,
    ) -> Result<Vec<PostSummary>, RepoError> {
        let tables = self.tables.read().await;
        tables
            .select(query)
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|post| tables.summarize(post))
            .collect()
    }

    async fn find_one(&self, query: &PostQuery) -> Result<Option<PostSummary>, RepoError> {
        let tables = self.tables.read().await;
        tables
            .select(query)
            .first()
            .map(|post| tables.summarize(post))
            .transpose()
    }
}

// ---- comments ---------------------------------------------------------------

#[async_trait]
impl BaseRepository<Comment, CommentId> for InMemoryStore {
    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, RepoError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn update(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        match tables.comments.get_mut(&comment.id) {
            Some(row) => {
                *row = comment.clone();
                Ok(comment)
            }
            None => Err(RepoError::NotFound),
        }
    }

    async fn delete(&self, id: CommentId) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        match tables.comments.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepoError::NotFound),
        }
    }
}

#[async_trait]
impl CommentRepository for InMemoryStore {
    async fn insert(&self, comment: NewComment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(RepoError::Constraint("comment post does not exist".to_string()));
        }
        if !tables.users.contains_key(&comment.author_id) {
            return Err(RepoError::Constraint("comment author does not exist".to_string()));
        }

        let comment = Comment {
            id: next(&mut tables.seq.comments),
            text: comment.text,
            post_id: comment.post_id,
            author_id: comment.author_id,
            created_at: Utc::now(),
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<CommentView>, RepoError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<CommentView> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .filter_map(|c| {
                tables.users.get(&c.author_id).map(|author| CommentView {
                    comment: c.clone(),
                    author: author.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.comment
                .created_at
                .cmp(&b.comment.created_at)
                .then(a.comment.id.cmp(&b.comment.id))
        });
        Ok(rows)
    }
}
