//! Form tokens against cross-site request forgery.
//!
//! Every rendered page carries the token stored in the encrypted
//! `budget_csrf` cookie. Form posts must echo it back in a `csrf_token`
//! field, which [`CsrfForm`] checks before decoding the form.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use axum::{
    Form,
    body::{Body, to_bytes},
    extract::{FromRequest, FromRequestParts, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Key, PrivateCookieJar};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::de::DeserializeOwned;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::BudgetError;
use crate::middleware::session::{CookieSettings, build_cookie};
use crate::router::BudgetState;

pub const CSRF_COOKIE: &str = "budget_csrf";
pub const CSRF_FIELD: &str = "csrf_token";

const FORM_BODY_LIMIT: usize = 64 * 1024;

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Return the browser's token, issuing one when it has none yet.
pub fn ensure_csrf_token(
    jar: PrivateCookieJar,
    settings: &CookieSettings,
) -> (PrivateCookieJar, String) {
    let existing = jar
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    if let Some(existing) = existing {
        return (jar, existing);
    }
    let token = generate_token();
    let jar = jar.add(build_cookie(
        CSRF_COOKIE,
        token.clone(),
        settings.secure,
        settings.session_max_age,
    ));
    (jar, token)
}

pub fn csrf_token_matches(jar: &PrivateCookieJar, submitted: Option<&str>) -> bool {
    let (Some(expected), Some(submitted)) = (jar.get(CSRF_COOKIE), submitted) else {
        return false;
    };
    let expected = expected.value().as_bytes();
    !expected.is_empty() && bool::from(expected.ct_eq(submitted.as_bytes()))
}

/// A urlencoded form whose `csrf_token` field matched the cookie.
#[derive(Debug, Clone)]
pub struct CsrfForm<T>(pub T);

impl<T> FromRequest<BudgetState> for CsrfForm<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &BudgetState) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let Ok(jar) = PrivateCookieJar::<Key>::from_request_parts(&mut parts, state).await;

        let bytes = to_bytes(body, FORM_BODY_LIMIT)
            .await
            .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE.into_response())?;

        let submitted = url::form_urlencoded::parse(&bytes)
            .find(|(k, _)| k == CSRF_FIELD)
            .map(|(_, v)| v.into_owned());
        if !csrf_token_matches(&jar, submitted.as_deref()) {
            warn!(
                path = %parts.uri.path(),
                token_present = submitted.is_some(),
                "rejected form post with a bad csrf token"
            );
            return Err(BudgetError::CsrfRejected.into_response());
        }

        let req = Request::from_parts(parts, Body::from(bytes));
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(CsrfForm(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CookieSettings {
        CookieSettings {
            secure: false,
            session_max_age: time::Duration::hours(1),
        }
    }

    #[test]
    fn token_is_issued_once_and_then_reused() {
        let jar = PrivateCookieJar::new(Key::generate());
        let (jar, first) = ensure_csrf_token(jar, &settings());
        let (jar, second) = ensure_csrf_token(jar, &settings());
        assert_eq!(first, second);
        assert!(first.len() >= 40);
        assert!(csrf_token_matches(&jar, Some(&first)));
    }

    #[test]
    fn missing_or_foreign_tokens_do_not_match() {
        let jar = PrivateCookieJar::new(Key::generate());
        assert!(!csrf_token_matches(&jar, Some("anything")));

        let (jar, token) = ensure_csrf_token(jar, &settings());
        assert!(!csrf_token_matches(&jar, None));
        assert!(!csrf_token_matches(&jar, Some("")));
        assert!(!csrf_token_matches(&jar, Some(&generate_token())));
        assert!(!csrf_token_matches(&jar, Some(&token[1..])));
    }
}
