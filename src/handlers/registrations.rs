use axum::extract::State;
use serde::Deserialize;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::events::DomainEvent;
use crate::extractors::{Json, Path};
use crate::fulfillment;
use crate::models::{
    CreateRegistration, FormAnswer, PaymentStatus, Registration, RegistrationStatus,
};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub answers: Vec<FormAnswer>,
    #[serde(default)]
    pub payment_proof_url: Option<String>,
}

/// Submission intake for free and manual-pay forms.
///
/// Processor-backed paid forms never come through here - their
/// registrations are created by the fulfillment engine after payment
/// confirms, so abandoned checkouts leave nothing behind.
pub async fn submit_registration(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<Registration>> {
    let conn = state.db.get()?;

    let form = queries::get_event_form(&conn, &form_id)?.or_not_found(msg::FORM_NOT_FOUND)?;

    if form.is_processor_paid() {
        return Err(AppError::BadRequest(
            "This form collects payment at checkout".into(),
        ));
    }

    if form.is_manual_paid() && form.require_proof && request.payment_proof_url.is_none() {
        return Err(AppError::BadRequest(msg::PROOF_REQUIRED.into()));
    }

    let registration = queries::create_registration(
        &conn,
        &CreateRegistration {
            form_id: form.id.clone(),
            data: request.answers,
            payment_proof_url: request.payment_proof_url,
            status: RegistrationStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            external_payment_ref: None,
        },
    )?;

    state.events.emit(&DomainEvent::RegistrationReceived {
        registration_id: registration.id.clone(),
        form_id: form.id,
    });

    Ok(Json(registration))
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub status: String,
}

/// Admin/mentor decision on a pending registration.
///
/// Approving a manual-pay registration settles it through the fulfillment
/// engine's registration-keyed idempotency; approving twice cannot
/// double-count revenue. Rejection is terminal.
pub async fn decide_registration(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Registration>> {
    let decision = RegistrationStatus::from_str(&request.status)
        .filter(|s| *s != RegistrationStatus::Pending)
        .ok_or_else(|| {
            AppError::BadRequest("Status must be 'approved' or 'rejected'".into())
        })?;

    let mut conn = state.db.get()?;

    match decision {
        RegistrationStatus::Rejected => {
            let registration =
                fulfillment::reject_registration(&conn, state.events.as_ref(), &registration_id)?;
            Ok(Json(registration))
        }
        RegistrationStatus::Approved => {
            let registration = queries::get_registration(&conn, &registration_id)?
                .or_not_found(msg::REGISTRATION_NOT_FOUND)?;
            let form = queries::get_event_form(&conn, &registration.form_id)?
                .or_not_found(msg::FORM_NOT_FOUND)?;

            if form.is_manual_paid() {
                let registration = fulfillment::approve_manual(
                    &mut conn,
                    state.events.as_ref(),
                    &registration_id,
                )?;
                return Ok(Json(registration));
            }

            // Free forms: a plain decision, no settlement.
            if registration.status == RegistrationStatus::Rejected {
                return Err(AppError::Conflict(msg::ALREADY_REJECTED.into()));
            }
            queries::set_registration_status(&conn, &registration_id, RegistrationStatus::Approved)?;
            state.events.emit(&DomainEvent::RegistrationDecided {
                registration_id: registration_id.clone(),
                status: RegistrationStatus::Approved,
            });
            queries::get_registration(&conn, &registration_id)?
                .or_not_found(msg::REGISTRATION_NOT_FOUND)
                .map(Json)
        }
        RegistrationStatus::Pending => unreachable!("filtered above"),
    }
}
