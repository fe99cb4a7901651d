//! `BlogService` driven end to end against the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use blogicum_core::BlogService;
use blogicum_core::domain::{
    Category, NewCategory, NewComment, NewPost, NewUser, Post, PostSummary, User, Viewer,
};
use blogicum_core::error::DomainError;
use blogicum_core::pagination::Page;
use blogicum_core::ports::{ModerationNotice, ModerationNotifier, NotifyError, Repositories};
use blogicum_infra::InMemoryStore;
use blogicum_shared::{CommentFormData, PostFormData, ProfileFormData};

#[derive(Default)]
struct Recorder {
    notices: Mutex<Vec<ModerationNotice>>,
}

#[async_trait]
impl ModerationNotifier for Recorder {
    async fn notify(&self, notice: ModerationNotice) -> Result<(), NotifyError> {
        self.notices.lock().await.push(notice);
        Ok(())
    }
}

struct Blog {
    service: BlogService,
    repos: Repositories,
    moderation: Arc<Recorder>,
}

fn blog() -> Blog {
    let repos = Repositories::from_store(Arc::new(InMemoryStore::new()));
    let moderation = Arc::new(Recorder::default());
    let service = BlogService::new(repos.clone(), moderation.clone()).with_page_size(10);
    Blog {
        service,
        repos,
        moderation,
    }
}

impl Blog {
    async fn user(&self, username: &str) -> (User, Viewer) {
        let user = self
            .repos
            .users
            .insert(NewUser::new(
                username.to_string(),
                format!("{username}@example.com"),
                "hash".to_string(),
            ))
            .await
            .unwrap();
        let viewer = Viewer::user(user.id, &user.username);
        (user, viewer)
    }

    async fn category(&self, slug: &str, published: bool) -> Category {
        let mut category = NewCategory::new(slug.to_uppercase(), slug);
        if !published {
            category = category.unpublished();
        }
        self.repos.categories.insert(category).await.unwrap()
    }

    async fn post(&self, post: NewPost) -> Post {
        self.repos.posts.insert(post).await.unwrap()
    }

    async fn index_ids(&self, viewer: &Viewer) -> Vec<i64> {
        ids(&self.service.index(viewer, None).await.unwrap())
    }

    async fn profile_ids(&self, viewer: &Viewer, username: &str) -> Vec<i64> {
        ids(&self.service.profile(viewer, username, None).await.unwrap().page)
    }
}

fn ids(page: &Page<PostSummary>) -> Vec<i64> {
    page.items.iter().map(|row| row.post.id).collect()
}

fn hour_ago() -> chrono::DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

#[tokio::test]
async fn unpublished_post_is_only_visible_to_its_author() {
    let blog = blog();
    let (anna, anna_viewer) = blog.user("anna").await;
    let (_, boris_viewer) = blog.user("boris").await;
    let travel = blog.category("travel", true).await;

    let draft = blog
        .post(
            NewPost::new(anna.id, "Draft", "Not yet")
                .in_category(travel.id)
                .published_at(hour_ago())
                .draft(),
        )
        .await;

    for viewer in [&Viewer::Anonymous, &boris_viewer, &anna_viewer] {
        assert!(!blog.index_ids(viewer).await.contains(&draft.id));
        let listing = blog
            .service
            .category_posts(viewer, "travel", None)
            .await
            .unwrap();
        assert!(listing.page.items.is_empty());
    }

    assert!(blog.profile_ids(&boris_viewer, "anna").await.is_empty());
    assert_eq!(blog.profile_ids(&anna_viewer, "anna").await, vec![draft.id]);

    let detail = blog.service.post_detail(&anna_viewer, draft.id).await.unwrap();
    assert!(detail.can_edit);
    assert!(matches!(
        blog.service.post_detail(&boris_viewer, draft.id).await,
        Err(DomainError::NotFound { .. })
    ));
    assert!(matches!(
        blog.service.post_detail(&Viewer::Anonymous, draft.id).await,
        Err(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn scheduled_post_follows_the_same_rule() {
    let blog = blog();
    let (anna, anna_viewer) = blog.user("anna").await;
    let (_, boris_viewer) = blog.user("boris").await;

    let scheduled = blog
        .post(NewPost::new(anna.id, "Soon", "Tomorrow").published_at(Utc::now() + Duration::days(1)))
        .await;

    assert!(blog.index_ids(&boris_viewer).await.is_empty());
    assert!(blog.profile_ids(&boris_viewer, "anna").await.is_empty());
    assert_eq!(blog.profile_ids(&anna_viewer, "anna").await, vec![scheduled.id]);
    assert!(blog.service.post_detail(&anna_viewer, scheduled.id).await.is_ok());
    assert!(blog.service.post_detail(&boris_viewer, scheduled.id).await.is_err());
}

#[tokio::test]
async fn unpublished_category_hides_its_posts_and_page() {
    let blog = blog();
    let (anna, anna_viewer) = blog.user("anna").await;
    let hidden = blog.category("hidden", false).await;

    let post = blog
        .post(
            NewPost::new(anna.id, "In hiding", "Text")
                .in_category(hidden.id)
                .published_at(hour_ago()),
        )
        .await;
    let loose = blog
        .post(NewPost::new(anna.id, "No category", "Text").published_at(hour_ago()))
        .await;

    assert_eq!(blog.index_ids(&Viewer::Anonymous).await, vec![loose.id]);
    assert!(matches!(
        blog.service
            .category_posts(&Viewer::Anonymous, "hidden", None)
            .await,
        Err(DomainError::NotFound { .. })
    ));
    assert!(matches!(
        blog.service.category_posts(&anna_viewer, "missing", None).await,
        Err(DomainError::NotFound { .. })
    ));

    // The author still reaches it.
    assert!(blog.service.post_detail(&anna_viewer, post.id).await.is_ok());
    assert!(blog.profile_ids(&anna_viewer, "anna").await.contains(&post.id));
}

#[tokio::test]
async fn non_author_cannot_change_a_post() {
    let blog = blog();
    let (anna, _) = blog.user("anna").await;
    let (_, boris_viewer) = blog.user("boris").await;
    let post = blog
        .post(NewPost::new(anna.id, "Mine", "Hands off").published_at(hour_ago()))
        .await;

    let form = PostFormData {
        title: "Hijacked".to_string(),
        text: "Boris was here".to_string(),
        pub_date: "2020-01-01 10:00".to_string(),
        is_published: Some("on".to_string()),
        ..Default::default()
    };

    assert!(matches!(
        blog.service.edit_post(&boris_viewer, post.id, &form).await,
        Err(DomainError::PermissionDenied { post_id }) if post_id == post.id
    ));
    assert!(matches!(
        blog.service.delete_post(&boris_viewer, post.id).await,
        Err(DomainError::PermissionDenied { .. })
    ));
    assert!(matches!(
        blog.service.edit_post(&Viewer::Anonymous, post.id, &form).await,
        Err(DomainError::Unauthenticated)
    ));

    let stored = blog.repos.posts.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(stored, post);
}

#[tokio::test]
async fn one_word_comments_are_rejected_and_reported() {
    let blog = blog();
    let (anna, _) = blog.user("anna").await;
    let (boris, boris_viewer) = blog.user("boris").await;
    let post = blog
        .post(NewPost::new(anna.id, "Open", "Comment away").published_at(hour_ago()))
        .await;

    let rejected = blog
        .service
        .add_comment(
            &boris_viewer,
            post.id,
            &CommentFormData {
                text: "ok".to_string(),
            },
        )
        .await;
    match rejected {
        Err(DomainError::Validation(errors)) => assert!(errors.has("text")),
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert!(blog.repos.comments.list_for_post(post.id).await.unwrap().is_empty());

    let notices = blog.moderation.notices.lock().await.clone();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].author_id, boris.id);
    assert_eq!(notices[0].post_id, post.id);

    let comment = blog
        .service
        .add_comment(
            &boris_viewer,
            post.id,
            &CommentFormData {
                text: "ok thanks".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(comment.author_id, boris.id);

    let comments = blog.repos.comments.list_for_post(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author.username, "boris");

    let listed = blog.service.index(&Viewer::Anonymous, None).await.unwrap();
    assert_eq!(listed.items[0].comment_count, 1);
}

#[tokio::test]
async fn comments_need_a_visible_post_and_an_owner() {
    let blog = blog();
    let (anna, anna_viewer) = blog.user("anna").await;
    let (_, boris_viewer) = blog.user("boris").await;
    let draft = blog
        .post(NewPost::new(anna.id, "Draft", "Hidden").published_at(hour_ago()).draft())
        .await;
    let open = blog
        .post(NewPost::new(anna.id, "Open", "Visible").published_at(hour_ago()))
        .await;

    let form = CommentFormData {
        text: "nice post".to_string(),
    };
    assert!(matches!(
        blog.service.add_comment(&boris_viewer, draft.id, &form).await,
        Err(DomainError::NotFound { .. })
    ));
    assert!(matches!(
        blog.service.add_comment(&Viewer::Anonymous, open.id, &form).await,
        Err(DomainError::Unauthenticated)
    ));

    let comment = blog
        .service
        .add_comment(&boris_viewer, open.id, &form)
        .await
        .unwrap();

    assert!(matches!(
        blog.service
            .delete_comment(&anna_viewer, open.id, comment.id)
            .await,
        Err(DomainError::PermissionDenied { post_id }) if post_id == open.id
    ));
    // A comment addressed through the wrong post does not exist.
    assert!(matches!(
        blog.service
            .comment_for_edit(&boris_viewer, draft.id + 100, comment.id)
            .await,
        Err(DomainError::NotFound { .. })
    ));

    let edited = blog
        .service
        .edit_comment(
            &boris_viewer,
            open.id,
            comment.id,
            &CommentFormData {
                text: "really nice post".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.text, "really nice post");

    blog.service
        .delete_comment(&boris_viewer, open.id, comment.id)
        .await
        .unwrap();
    assert!(blog.repos.comments.list_for_post(open.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_post_removes_its_comments() {
    let blog = blog();
    let (anna, anna_viewer) = blog.user("anna").await;
    let post = blog
        .post(NewPost::new(anna.id, "Short lived", "Bye").published_at(hour_ago()))
        .await;
    let comment = blog
        .repos
        .comments
        .insert(NewComment {
            text: "see you".to_string(),
            post_id: post.id,
            author_id: anna.id,
        })
        .await
        .unwrap();

    blog.service.delete_post(&anna_viewer, post.id).await.unwrap();

    assert!(blog.repos.posts.find_by_id(post.id).await.unwrap().is_none());
    assert!(blog.repos.comments.find_by_id(comment.id).await.unwrap().is_none());
}

#[tokio::test]
async fn far_page_numbers_clamp() {
    let blog = blog();
    let (anna, _) = blog.user("anna").await;
    for i in 0..3 {
        blog.post(
            NewPost::new(anna.id, format!("Post {i}"), "Text")
                .published_at(hour_ago() - Duration::minutes(i)),
        )
        .await;
    }

    let first = blog.service.index(&Viewer::Anonymous, None).await.unwrap();
    let far = blog
        .service
        .index(&Viewer::Anonymous, Some("9999"))
        .await
        .unwrap();
    let garbage = blog
        .service
        .index(&Viewer::Anonymous, Some("last"))
        .await
        .unwrap();

    assert_eq!(first.items.len(), 3);
    assert_eq!(ids(&far), ids(&first));
    assert_eq!(ids(&garbage), ids(&first));
    assert_eq!(far.number, 1);
}

#[tokio::test]
async fn created_post_reads_back_with_the_viewer_as_author() {
    let blog = blog();
    let (_, anna_viewer) = blog.user("anna").await;
    let (boris, _) = blog.user("boris").await;
    let travel = blog.category("travel", true).await;

    // An `author` field in the submitted form is ignored.
    let form: PostFormData = serde_json::from_value(serde_json::json!({
        "title": "Trip to Kazan",
        "text": "It was great",
        "pub_date": "2024-05-04T10:30",
        "is_published": "on",
        "category": travel.id.to_string(),
        "author": boris.id.to_string(),
    }))
    .unwrap();

    let created = blog.service.create_post(&anna_viewer, &form).await.unwrap();
    let detail = blog
        .service
        .post_detail(&Viewer::Anonymous, created.id)
        .await
        .unwrap();

    assert_eq!(detail.post.post, created);
    assert_eq!(detail.post.author.username, "anna");
    assert_eq!(created.title, "Trip to Kazan");
    assert_eq!(created.text, "It was great");
    assert_eq!(created.category_id, Some(travel.id));
    assert!(created.is_published);
    assert!(!detail.can_edit);
}

#[tokio::test]
async fn invalid_post_form_reports_every_field() {
    let blog = blog();
    let (_, anna_viewer) = blog.user("anna").await;

    let form = PostFormData {
        category: Some("999".to_string()),
        title: "Title".to_string(),
        text: "Text".to_string(),
        pub_date: "2024-05-04".to_string(),
        ..Default::default()
    };
    match blog.service.create_post(&anna_viewer, &form).await {
        Err(DomainError::Validation(errors)) => assert!(errors.has("category")),
        other => panic!("expected a validation error, got {other:?}"),
    }

    assert!(matches!(
        blog.service
            .create_post(&Viewer::Anonymous, &PostFormData::default())
            .await,
        Err(DomainError::Unauthenticated)
    ));
}

#[tokio::test]
async fn profile_edit_keeps_usernames_unique() {
    let blog = blog();
    let (_, anna_viewer) = blog.user("anna").await;
    blog.user("boris").await;

    let taken = ProfileFormData {
        username: "boris".to_string(),
        email: "anna@example.com".to_string(),
        ..Default::default()
    };
    match blog.service.edit_profile(&anna_viewer, &taken).await {
        Err(DomainError::Validation(errors)) => assert!(errors.has("username")),
        other => panic!("expected a validation error, got {other:?}"),
    }

    let renamed = blog
        .service
        .edit_profile(
            &anna_viewer,
            &ProfileFormData {
                username: "anna.k".to_string(),
                email: "anna@example.org".to_string(),
                first_name: "Anna".to_string(),
                last_name: "K".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.username, "anna.k");
    assert!(blog.service.profile(&Viewer::Anonymous, "anna.k", None).await.is_ok());
    assert!(matches!(
        blog.service.profile(&Viewer::Anonymous, "anna", None).await,
        Err(DomainError::NotFound { .. })
    ));
}
