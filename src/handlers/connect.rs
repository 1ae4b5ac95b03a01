use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::connect;
use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::{Json, Query};

#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    pub mentor_id: String,
}

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    pub account_id: String,
    pub onboarding_url: String,
    /// False when the mentor already had a connected account.
    pub created: bool,
}

/// Provision the mentor's connected account if needed and return a hosted
/// onboarding link. Calling this again for an onboarded mentor just issues
/// a fresh link for the existing account.
pub async fn start_onboarding(
    State(state): State<AppState>,
    Json(request): Json<OnboardingRequest>,
) -> Result<Json<OnboardingResponse>> {
    let mut conn = state.db.get()?;

    let mentor =
        queries::get_mentor(&conn, &request.mentor_id)?.or_not_found(msg::MENTOR_NOT_FOUND)?;

    let provisioned =
        connect::provision_account(&mut conn, state.processor.as_ref(), &mentor).await?;

    // Re-read so the link call sees the stored account id.
    let mentor =
        queries::get_mentor(&conn, &request.mentor_id)?.or_not_found(msg::MENTOR_NOT_FOUND)?;

    let refresh_url = format!("{}/connect/refresh", state.base_url);
    let return_url = format!("{}/connect/return", state.base_url);
    let onboarding_url =
        connect::onboarding_link(state.processor.as_ref(), &mentor, &refresh_url, &return_url)
            .await?;

    Ok(Json(OnboardingResponse {
        account_id: provisioned.account_id,
        onboarding_url,
        created: provisioned.created,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub mentor_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub payment_account_id: Option<String>,
    pub details_submitted: bool,
    pub charges_enabled: bool,
    pub onboarding_complete: bool,
}

/// Poll the processor for the mentor's readiness flags and mirror them onto
/// the mentor record. Converges with the `account.updated` webhook channel
/// in either order.
pub async fn connect_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>> {
    let mut conn = state.db.get()?;

    let mentor =
        queries::get_mentor(&conn, &query.mentor_id)?.or_not_found(msg::MENTOR_NOT_FOUND)?;

    if mentor.payment_account_id.is_none() {
        return Ok(Json(StatusResponse {
            payment_account_id: None,
            details_submitted: false,
            charges_enabled: false,
            onboarding_complete: false,
        }));
    }

    let status =
        connect::sync_onboarding_status(&mut conn, state.processor.as_ref(), state.events.as_ref(), &mentor)
            .await?;

    Ok(Json(StatusResponse {
        payment_account_id: mentor.payment_account_id,
        details_submitted: status.details_submitted,
        charges_enabled: status.charges_enabled,
        onboarding_complete: status.is_ready(),
    }))
}
