//! Error handling - domain failures become pages and redirects.
//!
//! [`AppError`] responses carry an [`ErrorPage`] in their extensions; the
//! [`error_pages`] middleware renders 403 / 404 / 500 responses (handler
//! errors and unmatched routes alike) through the configured renderer, and
//! completes login redirects with the page the visitor asked for.

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::ServiceResponse;
use actix_web::http::{StatusCode, header, header::HeaderValue};
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{HttpMessage, HttpResponse, ResponseError, web};

use blogicum_core::domain::PostId;
use blogicum_core::error::{DomainError, RepoError};
use blogicum_shared::ErrorPage;

use crate::handlers::{LOGIN_URL, post_url};
use crate::middleware::auth::{login_redirect, requested_location};
use crate::observability::RequestId;
use crate::render::View;
use crate::state::AppState;

/// Marks a login redirect whose `next` is filled in by [`error_pages`].
#[derive(Debug, Clone, Copy)]
struct PendingLogin;

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mutation attempted by someone other than the author.
    #[error("Permission denied on post {post_id}")]
    PermissionDenied { post_id: PostId },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied { .. } | AppError::Unauthenticated => StatusCode::FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let page = match self {
            AppError::PermissionDenied { post_id } => {
                return HttpResponse::Found()
                    .insert_header((header::LOCATION, post_url(*post_id)))
                    .finish();
            }
            AppError::Unauthenticated => {
                let mut response = HttpResponse::Found()
                    .insert_header((header::LOCATION, LOGIN_URL))
                    .finish();
                response.extensions_mut().insert(PendingLogin);
                return response;
            }
            AppError::NotFound(detail) => ErrorPage::not_found().with_detail(detail),
            AppError::Forbidden(detail) => ErrorPage::forbidden().with_detail(detail),
            AppError::BadRequest(detail) => ErrorPage::new(400, "Bad Request").with_detail(detail),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                ErrorPage::internal_error()
            }
        };

        let mut response = HttpResponse::build(self.status_code()).json(&page);
        response.extensions_mut().insert(page);
        response
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity, key } => {
                AppError::NotFound(format!("{entity} {key} not found"))
            }
            DomainError::PermissionDenied { post_id } => AppError::PermissionDenied { post_id },
            DomainError::Unauthenticated => AppError::Unauthenticated,
            // Handlers redisplay their forms; anything reaching here had no form.
            DomainError::Validation(errors) => AppError::BadRequest(errors.to_string()),
            DomainError::Duplicate(msg) => AppError::BadRequest(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("Resource not found".to_string()),
            RepoError::Constraint(msg) => AppError::BadRequest(msg),
            RepoError::Connection(msg) => {
                tracing::error!("Database connection error: {}", msg);
                AppError::Internal("Database error".to_string())
            }
            RepoError::Query(msg) => {
                tracing::error!("Database query error: {}", msg);
                AppError::Internal("Database error".to_string())
            }
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

/// Middleware rendering error statuses as pages.
pub fn error_pages<B: MessageBody + 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::FOUND, complete_login_redirect)
        .handler(StatusCode::BAD_REQUEST, render_error_page)
        .handler(StatusCode::FORBIDDEN, render_error_page)
        .handler(StatusCode::NOT_FOUND, render_error_page)
        .handler(StatusCode::METHOD_NOT_ALLOWED, render_error_page)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, render_error_page)
}

/// The error has no request at hand; the path is appended here.
fn complete_login_redirect<B: MessageBody + 'static>(
    mut res: ServiceResponse<B>,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let pending = res.response().extensions().contains::<PendingLogin>();
    if pending {
        let location = login_redirect(&requested_location(res.request()));
        match HeaderValue::from_str(&location) {
            Ok(value) => {
                res.headers_mut().insert(header::LOCATION, value);
            }
            Err(e) => tracing::warn!(error = %e, "Login redirect kept without next"),
        }
    }
    Ok(ErrorHandlerResponse::Response(res.map_into_left_body()))
}

fn render_error_page<B: MessageBody + 'static>(
    res: ServiceResponse<B>,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let status = res.status();
    let (req, res) = res.into_parts();

    let page = res.extensions().get::<ErrorPage>().cloned().unwrap_or_else(|| {
        ErrorPage::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error"),
        )
    });
    let page = match req.extensions().get::<RequestId>() {
        Some(id) => page.with_request_id(id.as_str()),
        None => page,
    };

    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        // No renderer configured: keep the original response.
        let res = ServiceResponse::new(req, res).map_into_left_body();
        return Ok(ErrorHandlerResponse::Response(res));
    };

    let rendered = View::new(page.template())
        .status(status)
        .with("error", &page)
        .render(state.renderer.as_ref());

    let response: HttpResponse<BoxBody> = match rendered {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Failed to render error page");
            HttpResponse::build(status).json(&page)
        }
    };

    let res = ServiceResponse::new(req, response).map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}
