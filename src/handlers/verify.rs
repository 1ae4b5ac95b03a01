use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::fulfillment;
use crate::models::{PaymentStatus, RegistrationStatus};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub registration_id: String,
    pub status: RegistrationStatus,
    pub payment_status: PaymentStatus,
}

/// Synchronous fulfillment path: the client calls this when the participant
/// returns from the hosted checkout. Races freely with the webhook channel;
/// refreshing the return page re-invokes it harmlessly.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let mut conn = state.db.get()?;

    let registration = fulfillment::fulfill_checkout(
        &mut conn,
        state.processor.as_ref(),
        state.events.as_ref(),
        &request.session_id,
    )
    .await?;

    Ok(Json(VerifyResponse {
        registration_id: registration.id,
        status: registration.status,
        payment_status: registration.payment_status,
    }))
}
