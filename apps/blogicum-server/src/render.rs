//! Rendering collaborator.
//!
//! Handlers build a [`View`] (template name, status, context) and a
//! [`Renderer`] turns it into a body. The shipped [`JsonRenderer`] emits the
//! view itself as JSON; an HTML template engine plugs in behind the same trait.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use serde::Serialize;
use serde_json::{Map, Value};

use blogicum_core::domain::Viewer;

use crate::middleware::error::{AppError, AppResult};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Template {template} failed to render: {reason}")]
    Template { template: String, reason: String },
}

pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, status: StatusCode, context: &Value)
    -> Result<String, RenderError>;

    fn content_type(&self) -> ContentType;
}

/// Serializes `{template, status, context}`.
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(
        &self,
        template: &str,
        status: StatusCode,
        context: &Value,
    ) -> Result<String, RenderError> {
        let body = serde_json::json!({
            "template": template,
            "status": status.as_u16(),
            "context": context,
        });
        serde_json::to_string(&body).map_err(|e| RenderError::Template {
            template: template.to_string(),
            reason: e.to_string(),
        })
    }

    fn content_type(&self) -> ContentType {
        ContentType::json()
    }
}

/// A template invocation being assembled by a handler.
pub struct View {
    template: &'static str,
    status: StatusCode,
    context: Map<String, Value>,
    failure: Option<String>,
}

impl View {
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            status: StatusCode::OK,
            context: Map::new(),
            failure: None,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a context entry.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.context.insert(key.to_string(), value);
            }
            Err(e) => {
                self.failure
                    .get_or_insert_with(|| format!("context entry {key}: {e}"));
            }
        }
        self
    }

    /// The `user` entry every page gets.
    pub fn viewer(self, viewer: &Viewer) -> Self {
        self.with("user", viewer)
    }

    pub fn render(self, renderer: &dyn Renderer) -> AppResult<HttpResponse> {
        if let Some(reason) = self.failure {
            return Err(AppError::Internal(format!(
                "Template {} failed to render: {reason}",
                self.template
            )));
        }

        let body = renderer
            .render(self.template, self.status, &Value::Object(self.context))
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(HttpResponse::build(self.status)
            .content_type(renderer.content_type())
            .body(body))
    }
}
