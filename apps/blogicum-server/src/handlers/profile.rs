//! Profile pages.

use actix_web::{HttpResponse, http::header, web};

use blogicum_core::{DomainError, FormErrors};
use blogicum_core::domain::{User, Viewer};
use blogicum_shared::{PageQuery, ProfileFormData};

use super::auth::start_session;
use super::profile_url;
use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::AppResult;
use crate::render::View;
use crate::state::AppState;

/// GET /profile/{username}/
///
/// The owner sees their drafts and scheduled posts; everyone else sees the
/// public ones.
pub async fn profile(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let listing = state
        .blog
        .profile(&viewer, &username, query.page.as_deref())
        .await?;

    View::new("blog/profile.html")
        .with("profile", &listing.profile)
        .with("page_obj", &listing.page)
        .with("is_owner", listing.is_owner)
        .viewer(&viewer)
        .render(state.renderer.as_ref())
}

/// GET /edit_profile/
pub async fn edit_form(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();
    let user = state.blog.current_user(&viewer).await?;
    render_profile_form(&state, &viewer, &prefill(&user), &FormErrors::new())
}

/// POST /edit_profile/
pub async fn edit_profile(
    state: web::Data<AppState>,
    identity: Identity,
    form: web::Form<ProfileFormData>,
) -> AppResult<HttpResponse> {
    let viewer = identity.viewer();

    match state.blog.edit_profile(&viewer, &form).await {
        Ok(user) => {
            // The token names the user; a rename needs a fresh one.
            let mut response = HttpResponse::Found();
            response.insert_header((header::LOCATION, profile_url(&user.username)));
            if user.username != identity.username {
                response.cookie(start_session(&state, &user)?);
            }
            Ok(response.finish())
        }
        Err(DomainError::Validation(errors)) => {
            render_profile_form(&state, &viewer, &form, &errors)
        }
        Err(e) => Err(e.into()),
    }
}

fn render_profile_form(
    state: &AppState,
    viewer: &Viewer,
    form: &ProfileFormData,
    errors: &FormErrors,
) -> AppResult<HttpResponse> {
    View::new("blog/user.html")
        .with("form", form)
        .with("form_errors", errors)
        .viewer(viewer)
        .render(state.renderer.as_ref())
}

fn prefill(user: &User) -> ProfileFormData {
    ProfileFormData {
        username: user.username.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}
