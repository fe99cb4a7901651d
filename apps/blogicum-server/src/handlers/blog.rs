//! Post listings, detail page and the post form.

use actix_web::{HttpResponse, web};
use chrono::Utc;

use blogicum_core::domain::{Post, PostId, Viewer};
use blogicum_core::{DomainError, FormErrors, forms};
use blogicum_shared::{CommentFormData, PageQuery, PostFormData};

use super::{post_url, profile_url, redirect};
use crate::media::{ImageUpload, MediaError, PostSubmission};
use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::{AppError, AppResult};
use crate::render::View;
use crate::state::AppState;

/// Value format of `<input type="datetime-local">`.
const PUB_DATE_INPUT: &str = "%Y-%m-%dT%H:%M";

/// GET /
pub async fn index(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let page = state.blog.index(&viewer, query.page.as_deref()).await?;

    View::new("blog/index.html")
        .with("page_obj", &page)
        .viewer(&viewer)
        .render(state.renderer.as_ref())
}

/// GET /category/{slug}/
pub async fn category(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let listing = state
        .blog
        .category_posts(&viewer, &slug, query.page.as_deref())
        .await?;

    View::new("blog/category.html")
        .with("category", &listing.category)
        .with("page_obj", &listing.page)
        .viewer(&viewer)
        .render(state.renderer.as_ref())
}

/// GET /posts/{post_id}/
pub async fn detail(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    post_id: web::Path<PostId>,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    render_detail(
        &state,
        &viewer,
        *post_id,
        &CommentFormData::default(),
        &FormErrors::new(),
    )
    .await
}

/// The detail page, optionally redisplaying a refused comment.
pub(super) async fn render_detail(
    state: &AppState,
    viewer: &Viewer,
    post_id: PostId,
    form: &CommentFormData,
    errors: &FormErrors,
) -> AppResult<HttpResponse> {
    let detail = state.blog.post_detail(viewer, post_id).await?;

    View::new("blog/detail.html")
        .with("post", &detail.post)
        .with("comments", &detail.comments)
        .with("can_edit", detail.can_edit)
        .with("form", form)
        .with("form_errors", errors)
        .viewer(viewer)
        .render(state.renderer.as_ref())
}

/// GET /posts/create/
pub async fn create_form(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    let form = PostFormData {
        pub_date: Utc::now().format(PUB_DATE_INPUT).to_string(),
        is_published: Some("on".to_string()),
        ..PostFormData::default()
    };
    render_post_form(&state, &identity.viewer(), None, &form, &FormErrors::new()).await
}

/// POST /posts/create/
pub async fn create(
    state: web::Data<AppState>,
    identity: Identity,
    submission: PostSubmission,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let PostSubmission { mut form, image } = submission;

    if let Some(errors) = attach_image(&state, &mut form, image).await? {
        return render_post_form(&state, &viewer, None, &form, &errors).await;
    }

    match state.blog.create_post(&viewer, &form).await {
        Ok(_) => Ok(redirect(profile_url(&identity.username))),
        Err(e) => {
            discard_image(&state, &mut form).await;
            match e {
                DomainError::Validation(errors) => {
                    render_post_form(&state, &viewer, None, &form, &errors).await
                }
                e => Err(e.into()),
            }
        }
    }
}

/// GET /posts/{post_id}/edit/
pub async fn edit_form(
    state: web::Data<AppState>,
    identity: Identity,
    post_id: web::Path<PostId>,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let post = state.blog.post_for_edit(&viewer, *post_id).await?;

    render_post_form(
        &state,
        &viewer,
        Some(post.id),
        &prefill(&post),
        &FormErrors::new(),
    )
    .await
}

/// POST /posts/{post_id}/edit/
///
/// Without a new upload the post keeps its image.
pub async fn edit(
    state: web::Data<AppState>,
    identity: Identity,
    post_id: web::Path<PostId>,
    submission: PostSubmission,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let post_id = post_id.into_inner();
    let PostSubmission { mut form, image } = submission;

    if let Some(errors) = attach_image(&state, &mut form, image).await? {
        return render_post_form(&state, &viewer, Some(post_id), &form, &errors).await;
    }

    match state.blog.edit_post(&viewer, post_id, &form).await {
        Ok(post) => Ok(redirect(post_url(post.id))),
        Err(e) => {
            discard_image(&state, &mut form).await;
            match e {
                DomainError::Validation(errors) => {
                    render_post_form(&state, &viewer, Some(post_id), &form, &errors).await
                }
                e => Err(e.into()),
            }
        }
    }
}

/// Store the uploaded image, if any, and point the form at it.
///
/// A refused upload yields the form's errors, the other fields' included.
async fn attach_image(
    state: &AppState,
    form: &mut PostFormData,
    image: Option<ImageUpload>,
) -> AppResult<Option<FormErrors>> {
    let Some(image) = image else {
        return Ok(None);
    };

    match state.media.save_image(&image).await {
        Ok(path) => {
            form.image = Some(path);
            Ok(None)
        }
        Err(MediaError::Io(e)) => Err(AppError::Internal(format!("Failed to store image: {e}"))),
        Err(refused) => {
            tracing::debug!(filename = %image.filename, reason = %refused, "Image refused");
            let mut errors = forms::validate_post(form).err().unwrap_or_default();
            errors.add("image", refused.to_string());
            Ok(Some(errors))
        }
    }
}

/// Drop an image stored for a submission that was not saved.
async fn discard_image(state: &AppState, form: &mut PostFormData) {
    if let Some(path) = form.image.take() {
        state.media.discard(&path).await;
    }
}

/// POST /posts/{post_id}/delete/
pub async fn delete(
    state: web::Data<AppState>,
    identity: Identity,
    post_id: web::Path<PostId>,
) -> AppResult<HttpResponse> {
    state.blog.delete_post(&identity.viewer(), *post_id).await?;
    Ok(redirect(profile_url(&identity.username)))
}

/// `blog/create.html` serves both creation and editing; `post_id` tells them apart.
async fn render_post_form(
    state: &AppState,
    viewer: &Viewer,
    post_id: Option<PostId>,
    form: &PostFormData,
    errors: &FormErrors,
) -> AppResult<HttpResponse> {
    let choices = state.blog.form_choices().await?;

    View::new("blog/create.html")
        .with("post_id", post_id)
        .with("form", form)
        .with("form_errors", errors)
        .with("categories", &choices.categories)
        .with("locations", &choices.locations)
        .viewer(viewer)
        .render(state.renderer.as_ref())
}

fn prefill(post: &Post) -> PostFormData {
    PostFormData {
        title: post.title.clone(),
        text: post.text.clone(),
        pub_date: post.pub_date.format(PUB_DATE_INPUT).to_string(),
        is_published: post.is_published.then(|| "on".to_string()),
        location: post.location_id.map(|id| id.to_string()),
        category: post.category_id.map(|id| id.to_string()),
        image: post.image.clone(),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use blogicum_core::domain::NewPost;
    use chrono::Duration;

    use super::*;
    use crate::handlers::testing::{self, json, location, session};

    fn titles(body: &serde_json::Value) -> Vec<String> {
        body["context"]["page_obj"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["title"].as_str().unwrap().to_string())
            .collect()
    }

    #[actix_web::test]
    async fn index_shows_only_public_posts() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let hidden = testing::category(&state, "hidden", false).await;

        testing::post(&state, NewPost::new(anna.id, "visible", "text")).await;
        testing::post(&state, NewPost::new(anna.id, "draft", "text").draft()).await;
        testing::post(
            &state,
            NewPost::new(anna.id, "scheduled", "text").published_at(Utc::now() + Duration::days(1)),
        )
        .await;
        testing::post(
            &state,
            NewPost::new(anna.id, "filed away", "text").in_category(hidden),
        )
        .await;

        let app = test_app!(state);
        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body = json(res).await;
        assert_eq!(body["template"], "blog/index.html");
        assert_eq!(titles(&body), vec!["visible"]);
        assert_eq!(body["context"]["user"]["kind"], "anonymous");
    }

    #[actix_web::test]
    async fn far_page_clamps_to_last() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        for title in ["a", "b", "c"] {
            testing::post(&state, NewPost::new(anna.id, title, "text")).await;
        }

        let app = test_app!(state);
        let first = json(
            test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await,
        )
        .await;
        let far = json(
            test::call_service(
                &app,
                test::TestRequest::get().uri("/?page=9999").to_request(),
            )
            .await,
        )
        .await;

        assert_eq!(far["context"]["page_obj"], first["context"]["page_obj"]);
        assert_eq!(far["context"]["page_obj"]["number"], 1);
    }

    #[actix_web::test]
    async fn unpublished_category_page_is_404() {
        let state = testing::state();
        testing::category(&state, "hidden", false).await;

        let app = test_app!(state);
        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/category/hidden/").to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(res).await["template"], "pages/404.html");
    }

    #[actix_web::test]
    async fn drafts_are_visible_to_their_author_only() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let boris = testing::user(&state, "boris").await;
        let draft = testing::post(&state, NewPost::new(anna.id, "draft", "text").draft()).await;

        let app = test_app!(state);
        let uri = format!("/posts/{draft}/");

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&uri)
                .cookie(session(&state, &boris))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&uri)
                .cookie(session(&state, &anna))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        assert_eq!(body["context"]["post"]["title"], "draft");
        assert_eq!(body["context"]["can_edit"], true);
    }

    #[actix_web::test]
    async fn create_requires_login() {
        let state = testing::state();
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/posts/create/").to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/auth/login/?next=%2Fposts%2Fcreate%2F");
    }

    #[actix_web::test]
    async fn create_ignores_submitted_author() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let boris = testing::user(&state, "boris").await;
        let app = test_app!(state);

        let author = boris.id.to_string();
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/posts/create/")
                .cookie(session(&state, &anna))
                .set_form([
                    ("title", "Hello"),
                    ("text", "First post"),
                    ("pub_date", "2024-01-02T03:04"),
                    ("is_published", "on"),
                    ("author", author.as_str()),
                ])
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/profile/anna/");

        let post = state
            .blog
            .repositories()
            .posts
            .find_by_id(1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.author_id, anna.id);
        assert_eq!(post.title, "Hello");
    }

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nimage-bytes";

    fn post_fields() -> [(&'static str, &'static str); 4] {
        [
            ("title", "Hello"),
            ("text", "First post"),
            ("pub_date", "2024-01-02T03:04"),
            ("is_published", "on"),
        ]
    }

    #[actix_web::test]
    async fn uploaded_image_is_stored_under_the_media_root() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let app = test_app!(state);

        let (content_type, body) = testing::multipart(&post_fields(), Some(("cat.PNG", PNG)));
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/posts/create/")
                .cookie(session(&state, &anna))
                .insert_header((actix_web::http::header::CONTENT_TYPE, content_type))
                .set_payload(body)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FOUND);
        let post = state
            .blog
            .repositories()
            .posts
            .find_by_id(1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.title, "Hello");
        let image = post.image.unwrap();
        assert!(image.starts_with("posts_images/"));
        assert!(image.ends_with(".png"));
        let stored = std::fs::read(state.media.root().join(&image)).unwrap();
        assert_eq!(stored, PNG);
    }

    #[actix_web::test]
    async fn submitted_image_path_is_not_trusted() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let app = test_app!(state);

        let mut fields = post_fields().to_vec();
        fields.push(("image", "/etc/passwd"));

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/posts/create/")
                .cookie(session(&state, &anna))
                .set_form(&fields)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FOUND);

        let (content_type, body) = testing::multipart(&fields, None);
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/posts/create/")
                .cookie(session(&state, &anna))
                .insert_header((actix_web::http::header::CONTENT_TYPE, content_type))
                .set_payload(body)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FOUND);

        for id in [1, 2] {
            let post = state
                .blog
                .repositories()
                .posts
                .find_by_id(id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(post.image, None);
        }
    }

    #[actix_web::test]
    async fn non_image_upload_is_a_field_error() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let app = test_app!(state);

        let (content_type, body) =
            testing::multipart(&[("title", "Hello")], Some(("payload.sh", &b"#!/bin/sh"[..])));
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/posts/create/")
                .cookie(session(&state, &anna))
                .insert_header((actix_web::http::header::CONTENT_TYPE, content_type))
                .set_payload(body)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        assert_eq!(body["template"], "blog/create.html");
        assert!(body["context"]["form_errors"]["image"].is_array());
        assert!(body["context"]["form_errors"]["text"].is_array());
        assert!(body["context"]["form"]["image"].is_null());
        assert!(!state.media.root().join("posts_images").exists());
    }

    #[actix_web::test]
    async fn edit_without_upload_keeps_the_image() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let id = testing::post(
            &state,
            NewPost {
                image: Some("posts_images/kept.png".to_string()),
                ..NewPost::new(anna.id, "mine", "text")
            },
        )
        .await;
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/posts/{id}/edit/"))
                .cookie(session(&state, &anna))
                .set_form(post_fields())
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FOUND);

        let post = state
            .blog
            .repositories()
            .posts
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.image.as_deref(), Some("posts_images/kept.png"));
    }

    #[actix_web::test]
    async fn invalid_post_form_is_redisplayed() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/posts/create/")
                .cookie(session(&state, &anna))
                .set_form([("title", "No body"), ("pub_date", "soon")])
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        assert_eq!(body["template"], "blog/create.html");
        assert_eq!(body["context"]["form"]["title"], "No body");
        assert!(body["context"]["form_errors"]["text"].is_array());
        assert!(body["context"]["form_errors"]["pub_date"].is_array());
    }

    #[actix_web::test]
    async fn non_author_edit_redirects_to_detail() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let boris = testing::user(&state, "boris").await;
        let id = testing::post(&state, NewPost::new(anna.id, "mine", "text")).await;
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/posts/{id}/edit/"))
                .cookie(session(&state, &boris))
                .set_form([
                    ("title", "stolen"),
                    ("text", "text"),
                    ("pub_date", "2024-01-02"),
                ])
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), format!("/posts/{id}/"));

        let post = state
            .blog
            .repositories()
            .posts
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.title, "mine");
    }

    #[actix_web::test]
    async fn edit_form_is_prefilled() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let id = testing::post(&state, NewPost::new(anna.id, "mine", "text")).await;
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/posts/{id}/edit/"))
                .cookie(session(&state, &anna))
                .to_request(),
        )
        .await;

        let body = json(res).await;
        assert_eq!(body["context"]["post_id"], id);
        assert_eq!(body["context"]["form"]["title"], "mine");
        assert_eq!(body["context"]["form"]["is_published"], "on");
    }

    #[actix_web::test]
    async fn delete_goes_back_to_the_profile() {
        let state = testing::state();
        let anna = testing::user(&state, "anna").await;
        let id = testing::post(&state, NewPost::new(anna.id, "mine", "text")).await;
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/posts/{id}/delete/"))
                .cookie(session(&state, &anna))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/profile/anna/");
        assert!(
            state
                .blog
                .repositories()
                .posts
                .find_by_id(id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
