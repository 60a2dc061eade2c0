//! Encrypted-cookie session and one-shot flash messages.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use time::Duration;
use tracing::{debug, error, info};

use crate::db::{User, UserId, retry_storage};
use crate::error::BudgetError;
use crate::router::BudgetState;

pub const SESSION_COOKIE: &str = "budget_session";
pub const FLASH_COOKIE: &str = "budget_flash";

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub secure: bool,
    pub session_max_age: Duration,
}

pub fn start_session(
    jar: PrivateCookieJar,
    user_id: UserId,
    settings: &CookieSettings,
) -> PrivateCookieJar {
    jar.add(build_cookie(
        SESSION_COOKIE,
        user_id.to_string(),
        settings.secure,
        settings.session_max_age,
    ))
}

pub fn end_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(SESSION_COOKIE))
}

pub fn session_user_id(jar: &PrivateCookieJar) -> Option<UserId> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| c.value().parse::<UserId>().ok())
}

/// Queue a message for the next rendered page.
pub fn push_flash(
    jar: PrivateCookieJar,
    message: impl Into<String>,
    settings: &CookieSettings,
) -> PrivateCookieJar {
    let mut flashes = read_flashes(&jar);
    flashes.push(message.into());
    let value = match serde_json::to_string(&flashes) {
        Ok(v) => v,
        Err(e) => {
            error!("failed to encode flash messages: {}", e);
            return jar;
        }
    };
    jar.add(build_cookie(
        FLASH_COOKIE,
        value,
        settings.secure,
        Duration::minutes(5),
    ))
}

/// Drain queued messages.
pub fn take_flashes(jar: PrivateCookieJar) -> (PrivateCookieJar, Vec<String>) {
    let flashes = read_flashes(&jar);
    if flashes.is_empty() {
        return (jar, flashes);
    }
    (jar.remove(clear_cookie(FLASH_COOKIE)), flashes)
}

fn read_flashes(jar: &PrivateCookieJar) -> Vec<String> {
    jar.get(FLASH_COOKIE)
        .and_then(|c| serde_json::from_str(c.value()).ok())
        .unwrap_or_default()
}

pub(crate) fn build_cookie(
    name: &str,
    value: String,
    secure: bool,
    max_age: Duration,
) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// The logged-in user. Requests without a valid session are redirected to
/// `/login` before the handler runs.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<BudgetState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BudgetState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(jar) = PrivateCookieJar::<Key>::from_request_parts(parts, state).await;

        let user_id = match session_user_id(&jar).ok_or(BudgetError::MissingSession) {
            Ok(id) => id,
            Err(e) => {
                debug!(path = %parts.uri.path(), "{}", e);
                return Err(Redirect::to("/login").into_response());
            }
        };

        match retry_storage("session lookup", || state.storage.get_user(user_id)).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => {
                info!(user_id, "session refers to a missing user; clearing it");
                Err((end_session(jar), Redirect::to("/login")).into_response())
            }
            Err(e) => {
                error!(user_id, error = %e, "failed to load session user");
                let jar = push_flash(jar, e.user_message(), &state.cookies);
                Err((jar, Redirect::to("/login")).into_response())
            }
        }
    }
}
