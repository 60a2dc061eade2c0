use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::router::BudgetState;

fn key_matches(candidate: &str, expected: &str) -> bool {
    bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
}

/// Ensure the inbound maintenance request carries the admin key.
/// Accepts either:
/// - Query string: `?key=...`
/// - Header: `x-admin-key: ...`
/// - Header: `Authorization: Bearer ...`
///
/// Requires the key to be configured via `BUDGET_ADMIN_KEY`; without it every
/// request is answered with 404.
pub fn ensure_admin(
    headers: &HeaderMap,
    query: Option<&str>,
    expected: Option<&str>,
) -> Result<(), Response> {
    let Some(expected) = expected.filter(|k| !k.is_empty()) else {
        return Err(StatusCode::NOT_FOUND.into_response());
    };

    // 1) header: x-admin-key
    if let Some(hv) = headers.get("x-admin-key").and_then(|v| v.to_str().ok())
        && key_matches(hv, expected)
    {
        return Ok(());
    }

    // 2) header: Authorization: Bearer <key>
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        let auth = auth.trim();
        if let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            && key_matches(token, expected)
        {
            return Ok(());
        }
    }

    // 3) query: key=...
    if let Some(qs) = query {
        for (k, v) in url::form_urlencoded::parse(qs.as_bytes()) {
            if k == "key" && key_matches(&v, expected) {
                return Ok(());
            }
        }
    }

    Err((
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "unauthorized", "reason": "invalid or missing admin key"})),
    )
        .into_response())
}

#[derive(Debug, Clone, Copy)]
pub struct RequireAdminKey;

impl FromRequestParts<BudgetState> for RequireAdminKey {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BudgetState,
    ) -> Result<Self, Self::Rejection> {
        ensure_admin(&parts.headers, parts.uri.query(), state.admin_key.as_deref())?;
        Ok(Self)
    }
}
