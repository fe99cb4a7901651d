//! PostgreSQL repository implementations.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbConn, EntityTrait, FromQueryResult, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use blogicum_core::domain::{
    Category, Comment, CommentView, Location, NewCategory, NewComment, NewLocation, NewPost,
    NewUser, Post, PostId, PostSummary, User,
};
use blogicum_core::error::RepoError;
use blogicum_core::pagination::PageWindow;
use blogicum_core::policy::Visibility;
use blogicum_core::ports::{
    CategoryRepository, CommentRepository, LocationRepository, PostRepository, Repositories,
    UserRepository,
};
use blogicum_core::query::PostQuery;

use super::entity::category::{self, Entity as CategoryEntity};
use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::location::{self, Entity as LocationEntity};
use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, map_db_err};

/// PostgreSQL user repository.
pub type PostgresUserRepository = PostgresBaseRepository<UserEntity>;

/// PostgreSQL category repository.
pub type PostgresCategoryRepository = PostgresBaseRepository<CategoryEntity>;

/// PostgreSQL location repository.
pub type PostgresLocationRepository = PostgresBaseRepository<LocationEntity>;

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

/// PostgreSQL comment repository.
pub type PostgresCommentRepository = PostgresBaseRepository<CommentEntity>;

/// The entity store backed by one connection pool.
pub fn postgres_repositories(db: DbConn) -> Repositories {
    let db = Arc::new(db);
    Repositories {
        users: Arc::new(PostgresUserRepository::new(Arc::clone(&db))),
        categories: Arc::new(PostgresCategoryRepository::new(Arc::clone(&db))),
        locations: Arc::new(PostgresLocationRepository::new(Arc::clone(&db))),
        posts: Arc::new(PostgresPostRepository::new(Arc::clone(&db))),
        comments: Arc::new(PostgresCommentRepository::new(db)),
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let model = user::ActiveModel {
            id: NotSet,
            username: Set(user.username),
            email: Set(user.email),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            password_hash: Set(user.password_hash),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(map_db_err)?;

        Ok(model.into())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(username, "Finding user by username");

        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }
}

#[async_trait]
impl CategoryRepository for PostgresCategoryRepository {
    async fn insert(&self, category: NewCategory) -> Result<Category, RepoError> {
        let model = category::ActiveModel {
            id: NotSet,
            title: Set(category.title),
            description: Set(category.description),
            slug: Set(category.slug),
            is_published: Set(category.is_published),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(map_db_err)?;

        Ok(model.into())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let result = CategoryEntity::find()
            .filter(category::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn list_published(&self) -> Result<Vec<Category>, RepoError> {
        let result = CategoryEntity::find()
            .filter(category::Column::IsPublished.eq(true))
            .order_by_asc(category::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl LocationRepository for PostgresLocationRepository {
    async fn insert(&self, location: NewLocation) -> Result<Location, RepoError> {
        let model = location::ActiveModel {
            id: NotSet,
            name: Set(location.name),
            is_published: Set(location.is_published),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(map_db_err)?;

        Ok(model.into())
    }

    async fn list_published(&self) -> Result<Vec<Location>, RepoError> {
        let result = LocationEntity::find()
            .filter(location::Column::IsPublished.eq(true))
            .order_by_asc(location::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }
}

// ---- posts ------------------------------------------------------------------

/// `posts.category_id IN (SELECT id FROM categories WHERE is_published)`
/// or no category at all.
fn category_condition() -> Condition {
    let published_categories = Query::select()
        .column(category::Column::Id)
        .from(CategoryEntity)
        .and_where(category::Column::IsPublished.eq(true))
        .to_owned();

    Condition::any()
        .add(post::Column::CategoryId.is_null())
        .add(post::Column::CategoryId.in_subquery(published_categories))
}

fn public_condition(now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(post::Column::IsPublished.eq(true))
        .add(post::Column::PubDate.lte(now))
        .add(category_condition())
}

pub(crate) fn visibility_condition(visibility: &Visibility) -> Condition {
    match *visibility {
        Visibility::Everything => Condition::all(),
        Visibility::Public { now } => public_condition(now),
        Visibility::PublicOrAuthoredBy { author_id, now } => Condition::any()
            .add(post::Column::AuthorId.eq(author_id))
            .add(public_condition(now)),
    }
}

pub(crate) fn query_condition(query: &PostQuery) -> Condition {
    let mut condition = Condition::all().add(visibility_condition(&query.visibility));
    if let Some(id) = query.post_id {
        condition = condition.add(post::Column::Id.eq(id));
    }
    if let Some(id) = query.category_id {
        condition = condition.add(post::Column::CategoryId.eq(id));
    }
    if let Some(id) = query.author_id {
        condition = condition.add(post::Column::AuthorId.eq(id));
    }
    condition
}

#[derive(Debug, FromQueryResult)]
struct CommentCount {
    post_id: i64,
    comment_count: i64,
}

impl PostgresPostRepository {
    fn listing_select(query: &PostQuery) -> sea_orm::Select<PostEntity> {
        PostEntity::find()
            .filter(query_condition(query))
            .order_by_desc(post::Column::PubDate)
            .order_by_desc(post::Column::Id)
    }

    /// Attach authors, categories, locations and comment counts, one query each.
    async fn summarize(&self, rows: Vec<post::Model>) -> Result<Vec<PostSummary>, RepoError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<PostId> = rows.iter().map(|p| p.id).collect();
        let author_ids: BTreeSet<i64> = rows.iter().map(|p| p.author_id).collect();
        let category_ids: BTreeSet<i64> = rows.iter().filter_map(|p| p.category_id).collect();
        let location_ids: BTreeSet<i64> = rows.iter().filter_map(|p| p.location_id).collect();

        let authors: HashMap<i64, User> = UserEntity::find()
            .filter(user::Column::Id.is_in(author_ids))
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(|m| (m.id, User::from(m)))
            .collect();

        let categories: HashMap<i64, Category> = if category_ids.is_empty() {
            HashMap::new()
        } else {
            CategoryEntity::find()
                .filter(category::Column::Id.is_in(category_ids))
                .all(self.db.as_ref())
                .await
                .map_err(map_db_err)?
                .into_iter()
                .map(|m| (m.id, Category::from(m)))
                .collect()
        };

        let locations: HashMap<i64, Location> = if location_ids.is_empty() {
            HashMap::new()
        } else {
            LocationEntity::find()
                .filter(location::Column::Id.is_in(location_ids))
                .all(self.db.as_ref())
                .await
                .map_err(map_db_err)?
                .into_iter()
                .map(|m| (m.id, Location::from(m)))
                .collect()
        };

        let counts: HashMap<i64, u64> = CommentEntity::find()
            .select_only()
            .column(comment::Column::PostId)
            .column_as(Expr::col(comment::Column::Id).count(), "comment_count")
            .filter(comment::Column::PostId.is_in(post_ids))
            .group_by(comment::Column::PostId)
            .into_model::<CommentCount>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(|c| (c.post_id, c.comment_count.max(0) as u64))
            .collect();

        rows.into_iter()
            .map(|model| {
                let author = authors.get(&model.author_id).cloned().ok_or_else(|| {
                    RepoError::Query(format!("post {} has no author row", model.id))
                })?;
                let category = model.category_id.and_then(|id| categories.get(&id).cloned());
                let location = model.location_id.and_then(|id| locations.get(&id).cloned());
                let comment_count = counts.get(&model.id).copied().unwrap_or(0);

                Ok(PostSummary {
                    post: model.into(),
                    author,
                    category,
                    location,
                    comment_count,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn insert(&self, post: NewPost) -> Result<Post, RepoError> {
        let model = post::ActiveModel {
            id: NotSet,
            title: Set(post.title),
            text: Set(post.text),
            pub_date: Set(post.pub_date.into()),
            is_published: Set(post.is_published),
            author_id: Set(post.author_id),
            location_id: Set(post.location_id),
            category_id: Set(post.category_id),
            image: Set(post.image),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(map_db_err)?;

        Ok(model.into())
    }

    async fn count(&self, query: &PostQuery) -> Result<u64, RepoError> {
        PostEntity::find()
            .filter(query_condition(query))
            .count(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    async fn list(
        &self,
        query: &PostQuery,
        window: PageWindow,
    ) -> Result<Vec<PostSummary>, RepoError> {
        let rows = Self::listing_select(query)
            .offset(window.offset)
            .limit(window.limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        self.summarize(rows).await
    }

    async fn find_one(&self, query: &PostQuery) -> Result<Option<PostSummary>, RepoError> {
        let row = Self::listing_select(query)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.summarize(vec![row]).await?.pop())
    }
}

// ---- comments ---------------------------------------------------------------

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn insert(&self, comment: NewComment) -> Result<Comment, RepoError> {
        let model = comment::ActiveModel {
            id: NotSet,
            text: Set(comment.text),
            post_id: Set(comment.post_id),
            author_id: Set(comment.author_id),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(map_db_err)?;

        Ok(model.into())
    }

    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<CommentView>, RepoError> {
        let rows = CommentEntity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .find_also_related(UserEntity)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|(comment, author)| {
                author.map(|author| CommentView {
                    comment: comment.into(),
                    author: author.into(),
                })
            })
            .collect())
    }
}
