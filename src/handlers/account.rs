use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{fail, inline_error, page};
use crate::error::BudgetError;
use crate::middleware::csrf::CsrfForm;
use crate::middleware::session::{CurrentUser, end_session, push_flash, start_session};
use crate::router::BudgetState;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirmation: String,
    #[serde(default)]
    pub salary: String,
}

pub async fn login_page(State(state): State<BudgetState>, jar: PrivateCookieJar) -> Response {
    page(&state, jar, "login", json!({}))
}

/// POST /login -> starts a session and redirects home, or re-renders the form.
pub async fn login(
    State(state): State<BudgetState>,
    jar: PrivateCookieJar,
    CsrfForm(form): CsrfForm<LoginForm>,
) -> Response {
    match state
        .auth
        .verify_credentials(&form.username, &form.password)
        .await
    {
        Ok(user) => {
            info!(user_id = user.id, "user logged in");
            let jar = start_session(jar, user.id, &state.cookies);
            (jar, Redirect::to("/")).into_response()
        }
        Err(e @ BudgetError::InvalidCredentials) => inline_error(
            &state,
            jar,
            "login",
            StatusCode::UNAUTHORIZED,
            e,
            json!({ "username": form.username }),
        ),
        Err(e) => fail(&state, jar, e, "/login"),
    }
}

pub async fn register_page(State(state): State<BudgetState>, jar: PrivateCookieJar) -> Response {
    page(&state, jar, "register", json!({}))
}

/// POST /register -> creates the account and sends the user to the login form.
pub async fn register(
    State(state): State<BudgetState>,
    jar: PrivateCookieJar,
    CsrfForm(form): CsrfForm<RegisterForm>,
) -> Response {
    match state
        .auth
        .register(&form.username, &form.password, &form.confirmation, &form.salary)
        .await
    {
        Ok(_) => {
            let jar = push_flash(jar, "Registration successful; please log in", &state.cookies);
            (jar, Redirect::to("/login")).into_response()
        }
        Err(e @ BudgetError::Validation { .. }) => inline_error(
            &state,
            jar,
            "register",
            StatusCode::BAD_REQUEST,
            e,
            json!({ "username": form.username, "salary": form.salary }),
        ),
        Err(e) => fail(&state, jar, e, "/register"),
    }
}

pub async fn logout(CurrentUser(user): CurrentUser, jar: PrivateCookieJar) -> Response {
    info!(user_id = user.id, "user logged out");
    (end_session(jar), Redirect::to("/login")).into_response()
}
