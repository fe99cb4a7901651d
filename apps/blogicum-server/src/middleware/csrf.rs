//! Cross-site form protection.
//!
//! State-changing requests whose `Origin` (or, failing that, `Referer`) names
//! another host are refused with the 403 page before reaching a handler.

use std::future::{Ready, ready};

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{Method, header},
};
use futures::future::LocalBoxFuture;
use url::Url;

use blogicum_shared::ErrorPage;

/// Whether `source` (an `Origin` or `Referer` value) shares the scheme, host
/// and port of the site at `scheme://host`.
fn same_origin(source: &str, scheme: &str, host: &str) -> bool {
    // Opaque origins ("null") and garbage fail to parse.
    let Ok(source) = Url::parse(source) else {
        return false;
    };
    match Url::parse(&format!("{scheme}://{host}/")) {
        Ok(site) => source.origin() == site.origin(),
        Err(_) => false,
    }
}

fn is_cross_site(req: &ServiceRequest) -> bool {
    if matches!(
        *req.method(),
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    ) {
        return false;
    }

    let source = req
        .headers()
        .get(header::ORIGIN)
        .or_else(|| req.headers().get(header::REFERER))
        .and_then(|v| v.to_str().ok());

    match source {
        Some(source) => {
            let info = req.connection_info();
            !same_origin(source, info.scheme(), info.host())
        }
        None => false,
    }
}

/// Same-origin guard middleware factory.
pub struct SameOriginGuard;

impl<S, B> Transform<S, ServiceRequest> for SameOriginGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SameOriginGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SameOriginGuardService { service }))
    }
}

pub struct SameOriginGuardService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SameOriginGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_cross_site(&req) {
            tracing::warn!(path = %req.path(), "Cross-site form submission refused");

            let page = ErrorPage::forbidden().with_detail("CSRF verification failed.");
            let mut response = HttpResponse::Forbidden().json(&page);
            response.extensions_mut().insert(page);

            let (http_req, _payload) = req.into_parts();
            let srv_response = ServiceResponse::new(http_req, response);
            return Box::pin(async move { Ok(srv_response.map_into_right_body()) });
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}
