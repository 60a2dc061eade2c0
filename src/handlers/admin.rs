use axum::{Json, extract::State};

use crate::error::BudgetError;
use crate::middleware::auth::RequireAdminKey;
use crate::router::BudgetState;
use crate::service::archive::ArchiveReport;

/// POST /admin/archive -> moves all active expenses into history.
pub async fn run_archive(
    _auth: RequireAdminKey,
    State(state): State<BudgetState>,
) -> Result<Json<ArchiveReport>, BudgetError> {
    Ok(Json(state.archive.run().await?))
}

/// GET /admin/archive -> report of the last completed run, or null.
pub async fn last_archive(
    _auth: RequireAdminKey,
    State(state): State<BudgetState>,
) -> Result<Json<Option<ArchiveReport>>, BudgetError> {
    Ok(Json(state.archive.last_report().await?))
}
