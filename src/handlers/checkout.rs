use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::FormAnswer;
use crate::payments::CheckoutParams;
use crate::plans;

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub form_id: String,
    /// Draft answers; these are not persisted until payment confirms, so
    /// they ride along in session metadata.
    #[serde(default)]
    pub answers: Vec<FormAnswer>,
    /// Currency hint from the client. The form's configured currency is
    /// authoritative; a differing hint is logged and ignored.
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

/// Build a hosted checkout session splitting the sale between platform and
/// mentor. No local writes: the registration comes into existence only when
/// fulfillment confirms payment.
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>> {
    let conn = state.db.get()?;

    let form = queries::get_event_form(&conn, &request.form_id)?
        .ok_or_else(|| AppError::NotPayable("Form not found".into()))?;

    if !form.is_processor_paid() || form.price_cents <= 0 {
        return Err(AppError::NotPayable(
            "This form does not collect payments online".into(),
        ));
    }

    let mentor = queries::get_mentor(&conn, &form.mentor_id)?
        .ok_or_else(|| AppError::Internal(format!("Form {} has no mentor", form.id)))?;

    let Some(destination_account) = mentor.payment_account_id.clone() else {
        return Err(AppError::MentorNotReady);
    };
    if !mentor.onboarding_complete {
        return Err(AppError::MentorNotReady);
    }

    if let Some(ref hint) = request.currency {
        if !hint.eq_ignore_ascii_case(&form.currency) {
            tracing::debug!(
                "Currency hint {} ignored for form {} (configured {})",
                hint,
                form.id,
                form.currency
            );
        }
    }

    // Commission is a property of when the sale happens: the fee is fixed
    // here from the mentor's current tier, not recomputed at fulfillment.
    let application_fee_cents = plans::platform_fee_cents(form.price_cents, mentor.plan_tier);
    let answers_json = serde_json::to_string(&request.answers)?;

    let session = state
        .processor
        .create_checkout_session(&CheckoutParams {
            form_id: form.id.clone(),
            form_title: form.title.clone(),
            price_cents: form.price_cents,
            currency: form.currency.clone(),
            application_fee_cents,
            destination_account,
            answers_json,
            success_url: state.checkout_success_url.clone(),
            cancel_url: state.checkout_cancel_url.clone(),
        })
        .await?;

    tracing::info!(
        "Checkout session {} created for form {} (fee={})",
        session.id,
        form.id,
        application_fee_cents
    );

    Ok(Json(CreateCheckoutResponse {
        checkout_url: session.url,
        session_id: session.id,
    }))
}
