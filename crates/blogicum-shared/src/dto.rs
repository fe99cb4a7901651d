//! Form payloads - what the browser posts as `application/x-www-form-urlencoded`
//! (or, for the post form with an image, `multipart/form-data`).
//!
//! Every field defaults to empty so a missing input surfaces as a field error
//! during validation instead of a deserialization failure. Unknown fields
//! (an `author` smuggled into the post form, for instance) are ignored.

use serde::{Deserialize, Serialize};

/// Post create/edit form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFormData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Publication timestamp; a future value schedules the post.
    #[serde(default)]
    pub pub_date: String,
    /// Checkbox - browsers omit it entirely when unchecked.
    #[serde(default)]
    pub is_published: Option<String>,
    /// Location id, empty for none.
    #[serde(default)]
    pub location: Option<String>,
    /// Category id, empty for none.
    #[serde(default)]
    pub category: Option<String>,
    /// Stored image path, relative to the media root. Filled by the server
    /// from an uploaded file, never read from the submitted fields.
    #[serde(default, skip_deserializing)]
    pub image: Option<String>,
}

impl PostFormData {
    /// Whether the publication checkbox was ticked.
    pub fn is_published_checked(&self) -> bool {
        match self.is_published.as_deref() {
            None => false,
            Some(value) => !matches!(value.trim(), "" | "0" | "off" | "false"),
        }
    }
}

/// Comment create/edit form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentFormData {
    #[serde(default)]
    pub text: String,
}

/// Profile edit form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFormData {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Login form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginFormData {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Where to go after a successful login.
    #[serde(default)]
    pub next: Option<String>,
}

/// Registration form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterFormData {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

/// `?page=` query parameter of paginated listings.
///
/// Kept as a raw string: non-numeric input is a valid request for page 1.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}
