//! Error page model handed to the rendering collaborator.

use serde::{Deserialize, Serialize};

/// Context of the 403 / 404 / 500 pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPage {
    /// The HTTP status code.
    pub status: u16,

    /// A short, human-readable summary.
    pub title: String,

    /// Optional explanation for this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Request ID for debugging purposes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorPage {
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            status,
            title: title.into(),
            detail: None,
            request_id: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Template the page renders with.
    pub fn template(&self) -> &'static str {
        match self.status {
            403 => "pages/403csrf.html",
            404 => "pages/404.html",
            _ => "pages/500.html",
        }
    }

    pub fn forbidden() -> Self {
        Self::new(403, "Forbidden")
    }

    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    pub fn internal_error() -> Self {
        Self::new(500, "Internal Server Error")
    }
}
