//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    /// Moderation jobs waiting for a worker.
    pub pending_jobs: Option<usize>,
}

/// Liveness check.
///
/// GET /health/
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let pending_jobs = match state.jobs.stats().await {
        Ok(stats) => Some(stats.pending),
        Err(e) => {
            tracing::warn!(error = %e, "Job queue stats unavailable");
            None
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        pending_jobs,
    })
}
