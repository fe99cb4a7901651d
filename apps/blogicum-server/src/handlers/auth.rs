//! Authentication handlers.
//!
//! A successful login or registration stores a JWT in the session cookie;
//! logout expires it.

use actix_web::cookie::Cookie;
use actix_web::{HttpResponse, http::header, web};
use serde::Deserialize;

use blogicum_core::domain::{NewUser, User, Viewer};
use blogicum_core::forms;
use blogicum_core::{FormErrors, RepoError};
use blogicum_shared::{LoginFormData, RegisterFormData};

use super::safe_next;
use crate::middleware::auth::{OptionalIdentity, cleared_session_cookie, session_cookie};
use crate::middleware::error::{AppError, AppResult};
use crate::render::View;
use crate::state::AppState;

const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Issue a token for `user` and wrap it in the session cookie.
pub(super) fn start_session(state: &AppState, user: &User) -> AppResult<Cookie<'static>> {
    let token = state
        .tokens
        .generate_token(user.id, &user.username)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(session_cookie(token, state.tokens.expiration_seconds()))
}

fn signed_in(location: &str, cookie: Cookie<'static>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .cookie(cookie)
        .finish()
}

/// GET /auth/login/
pub async fn login_form(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    query: web::Query<NextQuery>,
) -> AppResult<HttpResponse> {
    let form = LoginFormData {
        next: query.into_inner().next,
        ..LoginFormData::default()
    };
    render_login(&state, &identity.viewer(), &form, &FormErrors::new())
}

/// POST /auth/login/
pub async fn login(
    state: web::Data<AppState>,
    form: web::Form<LoginFormData>,
) -> AppResult<HttpResponse> {
    let form = form.into_inner();

    let user = state
        .blog
        .repositories()
        .users
        .find_by_username(form.username.trim())
        .await?;

    let user = user.filter(|user| {
        state
            .passwords
            .verify(&form.password, &user.password_hash)
            .unwrap_or_else(|e| {
                tracing::warn!(user_id = user.id, error = %e, "Stored password hash unusable");
                false
            })
    });

    let Some(user) = user else {
        tracing::debug!(username = %form.username, "Login failed");
        let errors = FormErrors::new().with(FormErrors::NON_FIELD, INVALID_LOGIN);
        return render_login(&state, &Viewer::Anonymous, &form, &errors);
    };

    let next = form
        .next
        .as_deref()
        .and_then(safe_next)
        .unwrap_or_else(|| "/".to_string());

    tracing::info!(user_id = user.id, "User logged in");
    Ok(signed_in(&next, start_session(&state, &user)?))
}

/// POST /auth/logout/
pub async fn logout(state: web::Data<AppState>, identity: OptionalIdentity) -> AppResult<HttpResponse> {
    if let Some(identity) = &identity.0 {
        tracing::info!(user_id = identity.user_id, "User logged out");
    }

    let mut response = View::new("registration/logged_out.html")
        .viewer(&Viewer::Anonymous)
        .render(state.renderer.as_ref())?;
    response
        .add_cookie(&cleared_session_cookie())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(response)
}

/// GET /auth/registration/
pub async fn registration_form(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
) -> AppResult<HttpResponse> {
    render_registration(
        &state,
        &identity.viewer(),
        &RegisterFormData::default(),
        &FormErrors::new(),
    )
}

/// POST /auth/registration/
pub async fn register(
    state: web::Data<AppState>,
    form: web::Form<RegisterFormData>,
) -> AppResult<HttpResponse> {
    let form = form.into_inner();
    let users = &state.blog.repositories().users;

    let input = match forms::validate_registration(&form) {
        Ok(input) => input,
        Err(errors) => return render_registration(&state, &Viewer::Anonymous, &form, &errors),
    };

    if users.find_by_username(&input.username).await?.is_some() {
        let errors = FormErrors::new().with("username", USERNAME_TAKEN);
        return render_registration(&state, &Viewer::Anonymous, &form, &errors);
    }

    let password_hash = state
        .passwords
        .hash(&input.password)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let user = match users
        .insert(NewUser::new(input.username, input.email, password_hash))
        .await
    {
        Ok(user) => user,
        // Lost a race for the username.
        Err(RepoError::Constraint(_)) => {
            let errors = FormErrors::new().with("username", USERNAME_TAKEN);
            return render_registration(&state, &Viewer::Anonymous, &form, &errors);
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = user.id, "User registered");
    Ok(signed_in("/", start_session(&state, &user)?))
}

fn render_login(
    state: &AppState,
    viewer: &Viewer,
    form: &LoginFormData,
    errors: &FormErrors,
) -> AppResult<HttpResponse> {
    View::new("registration/login.html")
        .with("form", form)
        .with("form_errors", errors)
        .viewer(viewer)
        .render(state.renderer.as_ref())
}

fn render_registration(
    state: &AppState,
    viewer: &Viewer,
    form: &RegisterFormData,
    errors: &FormErrors,
) -> AppResult<HttpResponse> {
    View::new("registration/registration_form.html")
        .with("form", form)
        .with("form_errors", errors)
        .viewer(viewer)
        .render(state.renderer.as_ref())
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;

    use super::*;
    use crate::handlers::testing::{self, json, location};
    use crate::middleware::auth::SESSION_COOKIE;

    fn session_value<B>(res: &actix_web::dev::ServiceResponse<B>) -> Option<String> {
        res.response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_string())
    }

    async fn registered(state: &AppState, username: &str, password: &str) -> User {
        let hash = state.passwords.hash(password).unwrap();
        state
            .blog
            .repositories()
            .users
            .insert(NewUser::new(
                username.to_string(),
                format!("{username}@example.com"),
                hash,
            ))
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn registration_signs_the_user_in() {
        let state = testing::state();
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/registration/")
                .set_form([
                    ("username", "anna"),
                    ("email", "anna@example.com"),
                    ("password", "correct horse"),
                ])
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/");
        let token = session_value(&res).unwrap();
        let claims = state.tokens.validate_token(&token).unwrap();
        assert_eq!(claims.username, "anna");

        let user = state
            .blog
            .repositories()
            .users
            .find_by_username("anna")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(user.password_hash, "correct horse");
        assert!(state.passwords.verify("correct horse", &user.password_hash).unwrap());
    }

    #[actix_web::test]
    async fn duplicate_registration_is_a_field_error() {
        let state = testing::state();
        testing::user(&state, "anna").await;
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/registration/")
                .set_form([
                    ("username", "anna"),
                    ("email", "other@example.com"),
                    ("password", "correct horse"),
                ])
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        assert_eq!(body["template"], "registration/registration_form.html");
        assert!(body["context"]["form_errors"]["username"].is_array());
        assert!(body["context"]["form"]["password"].is_null());
    }

    #[actix_web::test]
    async fn login_follows_a_local_next() {
        let state = testing::state();
        registered(&state, "anna", "correct horse").await;
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login/")
                .set_form([
                    ("username", "anna"),
                    ("password", "correct horse"),
                    ("next", "/posts/create/"),
                ])
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/posts/create/");
        assert!(session_value(&res).is_some());
    }

    #[actix_web::test]
    async fn login_ignores_an_offsite_next() {
        let state = testing::state();
        registered(&state, "anna", "correct horse").await;
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login/")
                .set_form([
                    ("username", "anna"),
                    ("password", "correct horse"),
                    ("next", "//evil.example/"),
                ])
                .to_request(),
        )
        .await;

        assert_eq!(location(&res), "/");
    }

    #[actix_web::test]
    async fn login_ignores_a_next_hiding_a_second_slash() {
        let state = testing::state();
        registered(&state, "anna", "correct horse").await;
        let app = test_app!(state);

        for next in ["/\t/evil.example/", "/\n/evil.example/"] {
            let res = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/auth/login/")
                    .set_form([
                        ("username", "anna"),
                        ("password", "correct horse"),
                        ("next", next),
                    ])
                    .to_request(),
            )
            .await;

            assert_eq!(res.status(), StatusCode::FOUND, "next = {next:?}");
            assert_eq!(location(&res), "/");
            assert!(session_value(&res).is_some());
        }
    }

    #[actix_web::test]
    async fn wrong_password_redisplays_the_form() {
        let state = testing::state();
        registered(&state, "anna", "correct horse").await;
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login/")
                .set_form([("username", "anna"), ("password", "battery staple")])
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(session_value(&res).is_none());
        let body = json(res).await;
        assert_eq!(body["template"], "registration/login.html");
        assert_eq!(body["context"]["form_errors"]["__all__"][0], INVALID_LOGIN);
    }

    #[actix_web::test]
    async fn login_page_carries_next() {
        let state = testing::state();
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/auth/login/?next=/edit_profile/")
                .to_request(),
        )
        .await;

        let body = json(res).await;
        assert_eq!(body["context"]["form"]["next"], "/edit_profile/");
    }

    #[actix_web::test]
    async fn logout_expires_the_cookie() {
        let state = testing::state();
        let app = test_app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post().uri("/auth/logout/").to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(session_value(&res).as_deref(), Some(""));
        assert_eq!(json(res).await["template"], "registration/logged_out.html");
    }
}
