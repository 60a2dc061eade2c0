//! HTTP handlers. Page handlers never surface raw errors: failures become a
//! flash message plus a redirect, or an inline message on the login and
//! registration forms. Form posts go through [`CsrfForm`].
//!
//! [`CsrfForm`]: crate::middleware::csrf::CsrfForm

pub mod account;
pub mod admin;
pub mod budget;
pub mod profile;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::error::BudgetError;
use crate::middleware::csrf::ensure_csrf_token;
use crate::middleware::session::{push_flash, take_flashes};
use crate::render::PageContext;
use crate::router::BudgetState;

/// Render a view, consuming any pending flash messages.
pub(crate) fn page(
    state: &BudgetState,
    jar: PrivateCookieJar,
    view: &str,
    data: Value,
) -> Response {
    let (jar, flashes) = take_flashes(jar);
    let (jar, csrf_token) = ensure_csrf_token(jar, &state.cookies);
    let page = PageContext {
        flashes,
        csrf_token,
        data,
    };
    (jar, state.renderer.render(view, page)).into_response()
}

/// Re-render a form with the error shown inline.
pub(crate) fn inline_error(
    state: &BudgetState,
    jar: PrivateCookieJar,
    view: &str,
    status: StatusCode,
    err: BudgetError,
    mut data: Value,
) -> Response {
    log_failure(&err);
    let (jar, mut flashes) = take_flashes(jar);
    let message = err.user_message();
    if let (Some(obj), BudgetError::Validation { field, .. }) = (data.as_object_mut(), &err) {
        obj.insert("error".to_string(), json!({ "field": field, "message": message }));
    }
    flashes.push(message);
    let (jar, csrf_token) = ensure_csrf_token(jar, &state.cookies);
    let page = PageContext {
        flashes,
        csrf_token,
        data,
    };
    (status, jar, state.renderer.render(view, page)).into_response()
}

/// Flash the error and redirect to a page where the user can carry on.
pub(crate) fn fail(
    state: &BudgetState,
    jar: PrivateCookieJar,
    err: BudgetError,
    to: &str,
) -> Response {
    log_failure(&err);
    let jar = push_flash(jar, err.user_message(), &state.cookies);
    (jar, Redirect::to(to)).into_response()
}

fn log_failure(err: &BudgetError) {
    match err {
        BudgetError::Validation { .. }
        | BudgetError::InvalidCredentials
        | BudgetError::MissingSession
        | BudgetError::CsrfRejected => debug!("request rejected: {}", err),
        BudgetError::NotFound { .. } => warn!("request failed: {}", err),
        _ => error!("request failed: {}", err),
    }
}
