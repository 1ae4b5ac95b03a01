use axum::extract::State;

use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::EarningsSummary;

/// Read-only rollup of a mentor's completed ledger entries.
/// An empty ledger yields zeros, not an error.
pub async fn mentor_earnings(
    State(state): State<AppState>,
    Path(mentor_id): Path<String>,
) -> Result<Json<EarningsSummary>> {
    let conn = state.db.get()?;

    queries::get_mentor(&conn, &mentor_id)?.or_not_found(msg::MENTOR_NOT_FOUND)?;

    let summary = queries::mentor_earnings(&conn, &mentor_id)?;
    Ok(Json(summary))
}
