//! Post images.
//!
//! The post form arrives urlencoded or, when a file is attached, as
//! `multipart/form-data`. Uploaded images are written under the media root
//! with a generated name; only that name ever reaches the database, never a
//! path supplied by the client.

use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use actix_web::{FromRequest, HttpRequest, dev::Payload, error, http::header, web};
use futures::TryStreamExt;
use futures::future::LocalBoxFuture;
use uuid::Uuid;

use blogicum_shared::PostFormData;

/// Directory under the media root holding post images.
pub const IMAGE_DIR: &str = "posts_images";

/// Upper bound for one multipart part, file or text.
pub const MAX_PART_BYTES: usize = 5 * 1024 * 1024;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Upload a valid image. Allowed types: jpg, jpeg, png, gif, webp.")]
    UnsupportedType,

    #[error("The image is larger than {} MB.", MAX_PART_BYTES / (1024 * 1024))]
    TooLarge,

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// An image file part, held in memory until stored.
#[derive(Debug)]
pub struct ImageUpload {
    /// Client-side file name; only its extension is used.
    pub filename: String,
    pub data: Vec<u8>,
    /// Set when the part exceeded [`MAX_PART_BYTES`]; `data` is then partial.
    pub oversized: bool,
}

impl ImageUpload {
    fn extension(&self) -> Option<String> {
        let ext = Path::new(&self.filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }
}

/// Filesystem store for uploaded media.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `upload` and return its path relative to the media root.
    pub async fn save_image(&self, upload: &ImageUpload) -> Result<String, MediaError> {
        if upload.oversized {
            return Err(MediaError::TooLarge);
        }
        let ext = upload.extension().ok_or(MediaError::UnsupportedType)?;

        let dir = self.root.join(IMAGE_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("{}.{ext}", Uuid::new_v4());
        tokio::fs::write(dir.join(&name), &upload.data).await?;

        let path = format!("{IMAGE_DIR}/{name}");
        tracing::info!(path = %path, bytes = upload.data.len(), "Image stored");
        Ok(path)
    }

    /// Remove an image no post refers to. Failures are only logged.
    pub async fn discard(&self, path: &str) {
        if let Err(e) = tokio::fs::remove_file(self.root.join(path)).await {
            tracing::warn!(path, error = %e, "Failed to discard image");
        }
    }
}

/// A submitted post form with its optional image.
#[derive(Debug)]
pub struct PostSubmission {
    pub form: PostFormData,
    pub image: Option<ImageUpload>,
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| {
            v.trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
}

impl FromRequest for PostSubmission {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        if !is_multipart(req) {
            let form = web::Form::<PostFormData>::from_request(req, payload);
            return Box::pin(async move {
                Ok(PostSubmission {
                    form: form.await?.into_inner(),
                    image: None,
                })
            });
        }

        let multipart = Multipart::new(req.headers(), payload.take());
        Box::pin(read_multipart(multipart))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<PostSubmission, actix_web::Error> {
    let mut fields = serde_json::Map::new();
    let mut image = None;

    while let Some(mut field) = multipart.try_next().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = Vec::new();
        let mut oversized = false;
        while let Some(chunk) = field.try_next().await? {
            if data.len() + chunk.len() > MAX_PART_BYTES {
                oversized = true;
            } else if !oversized {
                data.extend_from_slice(&chunk);
            }
        }

        match filename {
            // Browsers send an empty, unnamed part when no file was chosen.
            Some(filename) if name == "image" => {
                if !filename.is_empty() || !data.is_empty() {
                    image = Some(ImageUpload {
                        filename,
                        data,
                        oversized,
                    });
                }
            }
            Some(filename) => {
                tracing::debug!(field = %name, %filename, "Ignoring unexpected file part");
            }
            None if oversized => {
                return Err(error::ErrorPayloadTooLarge(format!(
                    "Form field '{name}' is too large"
                )));
            }
            None => {
                let value = String::from_utf8(data).map_err(|_| {
                    error::ErrorBadRequest(format!("Form field '{name}' is not UTF-8"))
                })?;
                fields.insert(name, serde_json::Value::String(value));
            }
        }
    }

    let form = serde_json::from_value(serde_json::Value::Object(fields))
        .map_err(|e| error::ErrorBadRequest(e.to_string()))?;
    Ok(PostSubmission { form, image })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str) -> ImageUpload {
        ImageUpload {
            filename: filename.to_string(),
            data: b"\x89PNG\r\n\x1a\n".to_vec(),
            oversized: false,
        }
    }

    fn temp_store() -> MediaStore {
        MediaStore::new(std::env::temp_dir().join(format!("blogicum-media-{}", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn image_gets_a_generated_name() {
        let store = temp_store();

        let path = store.save_image(&upload("../../etc/Cat.PNG")).await.unwrap();

        assert!(path.starts_with("posts_images/"));
        assert!(path.ends_with(".png"));
        assert!(!path.contains(".."));
        let stored = tokio::fs::read(store.root().join(&path)).await.unwrap();
        assert_eq!(stored, b"\x89PNG\r\n\x1a\n");

        store.discard(&path).await;
        assert!(!store.root().join(&path).exists());
    }

    #[tokio::test]
    async fn only_images_are_accepted() {
        let store = temp_store();

        assert!(matches!(
            store.save_image(&upload("script.sh")).await,
            Err(MediaError::UnsupportedType)
        ));
        assert!(matches!(
            store.save_image(&upload("no-extension")).await,
            Err(MediaError::UnsupportedType)
        ));

        let mut big = upload("big.jpg");
        big.oversized = true;
        assert!(matches!(
            store.save_image(&big).await,
            Err(MediaError::TooLarge)
        ));
    }
}
