//! Static pages.

use actix_web::{HttpResponse, web};

use crate::middleware::auth::OptionalIdentity;
use crate::middleware::error::AppResult;
use crate::render::View;
use crate::state::AppState;

/// GET /pages/about/
pub async fn about(state: web::Data<AppState>, identity: OptionalIdentity) -> AppResult<HttpResponse> {
    View::new("pages/about.html")
        .viewer(&identity.viewer())
        .render(state.renderer.as_ref())
}

/// GET /pages/rules/
pub async fn rules(state: web::Data<AppState>, identity: OptionalIdentity) -> AppResult<HttpResponse> {
    View::new("pages/rules.html")
        .viewer(&identity.viewer())
        .render(state.renderer.as_ref())
}
