//! Comment handlers. Every outcome lands back on the post.

use actix_web::{HttpResponse, web};

use blogicum_core::domain::{Comment, CommentId, PostId, Viewer};
use blogicum_core::{DomainError, FormErrors};
use blogicum_shared::CommentFormData;

use super::blog::render_detail;
use super::{post_url, redirect};
use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::render::View;
use crate::state::AppState;

/// POST /posts/{post_id}/comment/
pub async fn add_comment(
    state: web::Data<AppState>,
    identity: Identity,
    post_id: web::Path<PostId>,
    form: web::Form<CommentFormData>,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let post_id = post_id.into_inner();

    match state.blog.add_comment(&viewer, post_id, &form).await {
        Ok(_) => Ok(redirect(post_url(post_id))),
        Err(DomainError::Validation(errors)) => {
            render_detail(&state, &viewer, post_id, &form, &errors).await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{post_id}/edit_comment/{comment_id}/
pub async fn edit_form(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(PostId, CommentId)>,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let (post_id, comment_id) = path.into_inner();
    let comment = state
        .blog
        .comment_for_edit(&viewer, post_id, comment_id)
        .await?;

    let form = CommentFormData {
        text: comment.text.clone(),
    };
    render_comment_form(&state, &viewer, &comment, &form, &FormErrors::new())
}

/// POST /posts/{post_id}/edit_comment/{comment_id}/
pub async fn edit_comment(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(PostId, CommentId)>,
    form: web::Form<CommentFormData>,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let (post_id, comment_id) = path.into_inner();

    match state
        .blog
        .edit_comment(&viewer, post_id, comment_id, &form)
        .await
    {
        Ok(_) => Ok(redirect(post_url(post_id))),
        Err(DomainError::Validation(errors)) => {
            let comment = state
                .blog
                .comment_for_edit(&viewer, post_id, comment_id)
                .await?;
            render_comment_form(&state, &viewer, &comment, &form, &errors)
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /posts/{post_id}/delete_comment/{comment_id}/
pub async fn delete_comment(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(PostId, CommentId)>,
) -> AppResult<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    state
        .blog
        .delete_comment(&identity.viewer(), post_id, comment_id)
        .await?;
    Ok(redirect(post_url(post_id)))
}

fn render_comment_form(
    state: &AppState,
    viewer: &Viewer,
    comment: &Comment,
    form: &CommentFormData,
    errors: &FormErrors,
) -> AppResult<HttpResponse> {
    View::new("blog/comment.html")
        .with("comment", comment)
        .with("form", form)
        .with("form_errors", errors)
        .viewer(viewer)
        .render(state.renderer.as_ref())
}
