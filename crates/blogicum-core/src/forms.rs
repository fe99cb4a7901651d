//! Form validation.
//!
//! Field-level checks turn the raw payloads from `blogicum_shared::dto` into
//! typed inputs. Checks that need storage (do the referenced category and
//! location exist, is a username taken) run in the service.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use blogicum_shared::{CommentFormData, PostFormData, ProfileFormData, RegisterFormData};

use crate::domain::{CategoryId, LocationId, NewPost, Post, PostId, UserId};
use crate::error::FormErrors;
use crate::ports::{ModerationNotice, ModerationNotifier};

pub const MAX_TITLE_LENGTH: usize = 256;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MIN_PASSWORD_LENGTH: usize = 8;

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice.";

/// A post form that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostInput {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub location_id: Option<LocationId>,
    pub category_id: Option<CategoryId>,
    pub image: Option<String>,
}

impl PostInput {
    pub fn into_new_post(self, author_id: UserId) -> NewPost {
        NewPost {
            title: self.title,
            text: self.text,
            pub_date: self.pub_date,
            is_published: self.is_published,
            author_id,
            location_id: self.location_id,
            category_id: self.category_id,
            image: self.image,
        }
    }

    /// Overwrite the editable fields. Author and creation time stay put, and
    /// so does the image unless a new one was uploaded.
    pub fn apply_to(self, post: &mut Post) {
        post.title = self.title;
        post.text = self.text;
        post.pub_date = self.pub_date;
        post.is_published = self.is_published;
        post.location_id = self.location_id;
        post.category_id = self.category_id;
        if self.image.is_some() {
            post.image = self.image;
        }
    }
}

pub fn validate_post(form: &PostFormData) -> Result<PostInput, FormErrors> {
    let mut errors = FormErrors::new();

    let title = form.title.trim().to_string();
    if title.is_empty() {
        errors.add("title", REQUIRED);
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        errors.add(
            "title",
            format!("Ensure this value has at most {MAX_TITLE_LENGTH} characters."),
        );
    }

    let text = form.text.trim().to_string();
    if text.is_empty() {
        errors.add("text", REQUIRED);
    }

    let pub_date = if form.pub_date.trim().is_empty() {
        errors.add("pub_date", REQUIRED);
        None
    } else {
        let parsed = parse_pub_date(&form.pub_date);
        if parsed.is_none() {
            errors.add("pub_date", "Enter a valid date/time.");
        }
        parsed
    };

    let location_id = parse_choice(form.location.as_deref()).unwrap_or_else(|()| {
        errors.add("location", INVALID_CHOICE);
        None
    });
    let category_id = parse_choice(form.category.as_deref()).unwrap_or_else(|()| {
        errors.add("category", INVALID_CHOICE);
        None
    });

    let image = form
        .image
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    match pub_date {
        Some(pub_date) if errors.is_empty() => Ok(PostInput {
            title,
            text,
            pub_date,
            is_published: form.is_published_checked(),
            location_id,
            category_id,
            image,
        }),
        _ => Err(errors),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD[T ]HH:MM[:SS]` and bare dates, as UTC.
/// Future values are fine: they schedule the post.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Empty select → `None`; anything else must be an id.
fn parse_choice(raw: Option<&str>) -> Result<Option<i64>, ()> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| ()),
    }
}

/// Why comment text was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentRejection {
    Missing,
    SingleWord,
}

/// Comment text rule: required, and more than one whitespace-delimited word.
pub fn check_comment_text(text: &str) -> Result<String, CommentRejection> {
    match text.split_whitespace().count() {
        0 => Err(CommentRejection::Missing),
        1 => Err(CommentRejection::SingleWord),
        _ => Ok(text.trim().to_string()),
    }
}

/// Validate a comment submission.
///
/// A single-word comment is refused and reported to moderation. The report
/// is fire-and-forget: a failed dispatch is logged and never changes the
/// outcome.
pub async fn validate_comment(
    form: &CommentFormData,
    post_id: PostId,
    author_id: UserId,
    notifier: &dyn ModerationNotifier,
) -> Result<String, FormErrors> {
    match check_comment_text(&form.text) {
        Ok(text) => Ok(text),
        Err(CommentRejection::Missing) => Err(FormErrors::new().with("text", REQUIRED)),
        Err(CommentRejection::SingleWord) => {
            let notice = ModerationNotice::short_comment(post_id, author_id, form.text.trim());
            if let Err(err) = notifier.notify(notice).await {
                tracing::warn!(post_id, author_id, error = %err, "Moderation notice dropped");
            }
            Err(FormErrors::new().with("text", "A comment must contain more than one word."))
        }
    }
}

/// A profile form that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInput {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

pub fn validate_profile(form: &ProfileFormData) -> Result<ProfileInput, FormErrors> {
    let mut errors = FormErrors::new();
    let username = check_username(&form.username, &mut errors);
    let email = check_email(&form.email, &mut errors);

    errors.into_result(ProfileInput {
        username,
        email,
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn validate_registration(form: &RegisterFormData) -> Result<RegistrationInput, FormErrors> {
    let mut errors = FormErrors::new();
    let username = check_username(&form.username, &mut errors);
    let email = check_email(&form.email, &mut errors);

    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            "password",
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."),
        );
    }

    errors.into_result(RegistrationInput {
        username,
        email,
        password: form.password.clone(),
    })
}

fn check_username(raw: &str, errors: &mut FormErrors) -> String {
    let username = raw.trim().to_string();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    } else if username.chars().count() > MAX_USERNAME_LENGTH {
        errors.add(
            "username",
            format!("Ensure this value has at most {MAX_USERNAME_LENGTH} characters."),
        );
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    username
}

fn check_email(raw: &str, errors: &mut FormErrors) -> String {
    let email = raw.trim().to_string();
    if email.is_empty() {
        errors.add("email", REQUIRED);
    } else if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        errors.add("email", "Enter a valid email address.");
    }
    email
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NotifyError;
    use async_trait::async_trait;
    use chrono::{Datelike, Timelike};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        notices: Mutex<Vec<ModerationNotice>>,
        fail: bool,
    }

    #[async_trait]
    impl ModerationNotifier for Recorder {
        async fn notify(&self, notice: ModerationNotice) -> Result<(), NotifyError> {
            self.notices.lock().unwrap().push(notice);
            if self.fail {
                Err(NotifyError::Dispatch("webhook down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn post_form() -> PostFormData {
        PostFormData {
            title: "Trip to Kazan".to_string(),
            text: "It was great".to_string(),
            pub_date: "2031-05-04T10:30".to_string(),
            is_published: Some("on".to_string()),
            location: Some("".to_string()),
            category: Some("2".to_string()),
            image: None,
        }
    }

    #[test]
    fn valid_post_form() {
        let input = validate_post(&post_form()).unwrap();
        assert_eq!(input.title, "Trip to Kazan");
        assert_eq!(input.category_id, Some(2));
        assert_eq!(input.location_id, None);
        assert!(input.is_published);
        assert_eq!(input.pub_date.year(), 2031);
        assert_eq!(input.pub_date.minute(), 30);
    }

    #[test]
    fn edit_without_upload_keeps_the_image() {
        let mut post = Post {
            id: 1,
            title: "old".to_string(),
            text: "old".to_string(),
            pub_date: Utc::now(),
            is_published: false,
            author_id: 1,
            location_id: None,
            category_id: None,
            image: Some("posts_images/a.png".to_string()),
            created_at: Utc::now(),
        };

        validate_post(&post_form()).unwrap().apply_to(&mut post);
        assert_eq!(post.title, "Trip to Kazan");
        assert_eq!(post.image.as_deref(), Some("posts_images/a.png"));

        let mut form = post_form();
        form.image = Some("posts_images/b.png".to_string());
        validate_post(&form).unwrap().apply_to(&mut post);
        assert_eq!(post.image.as_deref(), Some("posts_images/b.png"));
    }

    #[test]
    fn post_form_reports_every_missing_field() {
        let errors = validate_post(&PostFormData::default()).unwrap_err();
        assert!(errors.has("title"));
        assert!(errors.has("text"));
        assert!(errors.has("pub_date"));
        assert!(!errors.has("category"));
    }

    #[test]
    fn post_form_rejects_garbage() {
        let mut form = post_form();
        form.pub_date = "next tuesday".to_string();
        form.category = Some("travel".to_string());
        form.title = "x".repeat(MAX_TITLE_LENGTH + 1);

        let errors = validate_post(&form).unwrap_err();
        assert!(errors.has("pub_date"));
        assert!(errors.has("category"));
        assert!(errors.has("title"));
    }

    #[test]
    fn pub_date_formats() {
        assert!(parse_pub_date("2024-01-02").is_some());
        assert!(parse_pub_date("2024-01-02 03:04").is_some());
        assert!(parse_pub_date("2024-01-02T03:04:05").is_some());
        let dt = parse_pub_date("2024-01-02T03:04:05+03:00").unwrap();
        assert_eq!(dt.hour(), 0);
        assert!(parse_pub_date("02.01.2024").is_none());
    }

    #[test]
    fn comment_word_rule() {
        assert_eq!(check_comment_text("   "), Err(CommentRejection::Missing));
        assert_eq!(check_comment_text(" ok "), Err(CommentRejection::SingleWord));
        assert_eq!(check_comment_text(" ok thanks ").unwrap(), "ok thanks");
    }

    #[tokio::test]
    async fn single_word_comment_is_reported() {
        let recorder = Recorder::default();
        let form = CommentFormData {
            text: "ok".to_string(),
        };

        let errors = validate_comment(&form, 4, 2, &recorder).await.unwrap_err();
        assert!(errors.has("text"));

        let notices = recorder.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].post_id, 4);
        assert_eq!(notices[0].text, "ok");
    }

    #[tokio::test]
    async fn failed_report_does_not_change_the_outcome() {
        let recorder = Recorder {
            fail: true,
            ..Default::default()
        };
        let form = CommentFormData {
            text: "ok".to_string(),
        };

        assert!(validate_comment(&form, 4, 2, &recorder).await.is_err());
    }

    #[tokio::test]
    async fn empty_comment_is_not_reported() {
        let recorder = Recorder::default();
        let form = CommentFormData::default();

        assert!(validate_comment(&form, 4, 2, &recorder).await.is_err());
        assert!(recorder.notices.lock().unwrap().is_empty());
    }

    #[test]
    fn profile_rules() {
        let form = ProfileFormData {
            username: "anna k".to_string(),
            email: "anna".to_string(),
            first_name: " Anna ".to_string(),
            last_name: String::new(),
        };
        let errors = validate_profile(&form).unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("email"));

        let form = ProfileFormData {
            username: "anna.k".to_string(),
            email: "anna@example.com".to_string(),
            ..form
        };
        let input = validate_profile(&form).unwrap();
        assert_eq!(input.first_name, "Anna");
    }

    #[test]
    fn short_password_is_refused() {
        let form = RegisterFormData {
            username: "anna".to_string(),
            email: "anna@example.com".to_string(),
            password: "short".to_string(),
        };
        assert!(validate_registration(&form).unwrap_err().has("password"));
    }
}
