//! HTTP handlers and route configuration.
//!
//! Paths are declared with their trailing slash; `NormalizePath` in `main`
//! folds the slash-less spelling onto them.

/// An initialized test service over `state` with every route and the error pages.
#[cfg(test)]
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap($crate::middleware::error::error_pages())
                .app_data(actix_web::web::Data::new($state.clone()))
                .configure($crate::handlers::configure_routes),
        )
        .await
    };
}

mod auth;
mod blog;
mod comments;
mod health;
mod pages;
mod profile;

use actix_web::{HttpResponse, http::header, web};
use url::{Position, Url};

use blogicum_core::domain::PostId;

pub const LOGIN_URL: &str = "/auth/login/";

/// Stand-in origin for resolving relative redirect targets.
const SITE_ORIGIN: &str = "http://blogicum.invalid/";

pub fn post_url(post_id: PostId) -> String {
    format!("/posts/{post_id}/")
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{username}/")
}

/// 302 to `location`.
pub fn redirect(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.as_ref()))
        .finish()
}

/// `next` as an on-site location, or `None` when following it could leave
/// the site.
///
/// Browsers strip tabs and newlines before resolving a URL, so `/\t/host`
/// would become `//host`; control characters and whitespace are refused.
pub fn safe_next(next: &str) -> Option<String> {
    if !next.starts_with('/') || next.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return None;
    }

    let base = Url::parse(SITE_ORIGIN).ok()?;
    let target = base.join(next).ok()?;
    (target.origin() == base.origin()).then(|| target[Position::BeforePath..].to_string())
}

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(blog::index))
        .route("/health/", web::get().to(health::health_check))
        // Posts
        .service(
            web::resource("/posts/create/")
                .route(web::get().to(blog::create_form))
                .route(web::post().to(blog::create)),
        )
        .route("/posts/{post_id}/", web::get().to(blog::detail))
        .service(
            web::resource("/posts/{post_id}/edit/")
                .route(web::get().to(blog::edit_form))
                .route(web::post().to(blog::edit)),
        )
        .route("/posts/{post_id}/delete/", web::post().to(blog::delete))
        // Comments
        .route(
            "/posts/{post_id}/comment/",
            web::post().to(comments::add_comment),
        )
        .service(
            web::resource("/posts/{post_id}/edit_comment/{comment_id}/")
                .route(web::get().to(comments::edit_form))
                .route(web::post().to(comments::edit_comment)),
        )
        .route(
            "/posts/{post_id}/delete_comment/{comment_id}/",
            web::post().to(comments::delete_comment),
        )
        // Listings
        .route("/category/{slug}/", web::get().to(blog::category))
        .route("/profile/{username}/", web::get().to(profile::profile))
        .service(
            web::resource("/edit_profile/")
                .route(web::get().to(profile::edit_form))
                .route(web::post().to(profile::edit_profile)),
        )
        // Identity
        .service(
            web::scope("/auth")
                .service(
                    web::resource("/login/")
                        .route(web::get().to(auth::login_form))
                        .route(web::post().to(auth::login)),
                )
                .route("/logout/", web::post().to(auth::logout))
                .service(
                    web::resource("/registration/")
                        .route(web::get().to(auth::registration_form))
                        .route(web::post().to(auth::register)),
                ),
        )
        // Static pages
        .route("/pages/about/", web::get().to(pages::about))
        .route("/pages/rules/", web::get().to(pages::rules));
}
