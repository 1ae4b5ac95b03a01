//! Order fulfillment: turning confirmed payment signals into exactly one
//! paid registration and one ledger entry.
//!
//! Fulfillment is triggered by two racing channels - the processor's
//! `checkout.session.completed` webhook and the client's synchronous
//! verify call after redirect. Neither is ordered nor once-only, so the
//! engine is built around one idempotency key: the processor's
//! payment-intent id. An application-level existence check is the fast
//! path; the UNIQUE index on `external_payment_ref` is the authority of
//! last resort. The manual approval flow reuses the same discipline keyed
//! by registration id instead.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{msg, AppError, OptionExt, Result};
use crate::events::{DomainEvent, EventSink};
use crate::models::{
    CreateLedgerEntry, CreateRegistration, FormAnswer, LedgerStatus, PaymentMethod, PaymentStatus,
    Registration, RegistrationStatus,
};
use crate::payments::{PaymentProcessor, SessionDetail};
use crate::plans;

/// Fulfill a checkout session: resolve the payment reference, collapse
/// duplicate signals, and create the registration/ledger pair exactly once.
///
/// Both the webhook handler and the verify endpoint call this; repeated and
/// concurrent invocations for the same session return the same registration
/// without surfacing an error to any caller.
pub async fn fulfill_checkout(
    conn: &mut Connection,
    processor: &dyn PaymentProcessor,
    events: &dyn EventSink,
    session_id: &str,
) -> Result<Registration> {
    // Authoritative amounts come from the processor, never from the client.
    let detail = processor.checkout_session(session_id).await?;

    if !detail.is_paid() {
        return Err(AppError::PaymentNotConfirmed);
    }
    let payment_ref = detail
        .payment_intent
        .clone()
        .ok_or(AppError::PaymentNotConfirmed)?;

    // Fast path: already fulfilled. This converts at-least-once delivery
    // into effectively-once from the caller's point of view.
    if let Some(entry) = queries::get_ledger_entry_by_payment_ref(conn, &payment_ref)? {
        tracing::debug!(
            "Fulfillment for {} already complete (ledger entry {})",
            payment_ref,
            entry.id
        );
        return queries::get_registration(conn, &entry.registration_id)?
            .ok_or_else(|| AppError::Internal("Ledger entry without registration".into()));
    }

    let (form_id, answers) = decode_session_metadata(&detail)?;

    let form = queries::get_event_form(conn, &form_id)?.ok_or_else(|| {
        AppError::MalformedSession(format!("session {} references unknown form {}", session_id, form_id))
    })?;
    let mentor = queries::get_mentor(conn, &form.mentor_id)?
        .ok_or_else(|| AppError::Internal(format!("Form {} has no mentor", form.id)))?;

    let amount = detail.amount_total.unwrap_or(form.price_cents);
    let currency = detail
        .currency
        .clone()
        .unwrap_or_else(|| form.currency.clone());
    // The fee was fixed at session-creation time from the then-current plan
    // tier; fall back to the current tier only if the processor dropped it.
    let platform_fee = detail
        .application_fee_cents
        .unwrap_or_else(|| plans::platform_fee_cents(amount, mentor.plan_tier));
    let mentor_earnings = amount - platform_fee;

    // Registration and ledger entry are created together or not at all.
    let tx = conn.transaction()?;

    let registration = match queries::create_registration(
        &tx,
        &CreateRegistration {
            form_id: form.id.clone(),
            data: answers,
            payment_proof_url: None,
            status: RegistrationStatus::Approved,
            payment_status: PaymentStatus::Paid,
            external_payment_ref: Some(payment_ref.clone()),
        },
    ) {
        Ok(r) => r,
        Err(e) if e.is_unique_violation() => {
            drop(tx);
            return already_fulfilled(conn, &payment_ref);
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = queries::create_ledger_entry(
        &tx,
        &CreateLedgerEntry {
            mentor_id: mentor.id.clone(),
            form_id: form.id.clone(),
            registration_id: registration.id.clone(),
            amount_cents: amount,
            currency: currency.clone(),
            platform_fee_cents: platform_fee,
            mentor_earnings_cents: mentor_earnings,
            status: LedgerStatus::Completed,
            payment_method: PaymentMethod::Processor,
            external_payment_ref: Some(payment_ref.clone()),
        },
    ) {
        if e.is_unique_violation() {
            drop(tx);
            return already_fulfilled(conn, &payment_ref);
        }
        return Err(e);
    }

    tx.commit()?;

    events.emit(&DomainEvent::RegistrationPaid {
        registration_id: registration.id.clone(),
        form_id: form.id.clone(),
        mentor_id: mentor.id.clone(),
        amount_cents: amount,
        currency,
    });

    tracing::info!(
        "Checkout fulfilled: session={}, payment_ref={}, registration={}, fee={}",
        session_id,
        payment_ref,
        registration.id,
        platform_fee
    );

    Ok(registration)
}

/// The losing branch of a concurrent fulfillment race: another caller
/// inserted first, so fetch and return its registration as success.
fn already_fulfilled(conn: &Connection, payment_ref: &str) -> Result<Registration> {
    tracing::info!(
        "Concurrent fulfillment detected for {}, returning winner's record",
        payment_ref
    );
    queries::get_registration_by_payment_ref(conn, payment_ref)?
        .ok_or_else(|| AppError::Internal("Winning fulfillment record not found".into()))
}

/// Decode the form id and draft answers from session metadata.
///
/// The metadata is the only place the draft answers live before payment
/// confirms; missing or corrupt metadata is never guessed around.
fn decode_session_metadata(detail: &SessionDetail) -> Result<(String, Vec<FormAnswer>)> {
    let form_id = detail
        .form_id
        .clone()
        .ok_or_else(|| AppError::MalformedSession(format!("session {} has no form id", detail.id)))?;

    let answers_json = detail.answers_json.as_deref().ok_or_else(|| {
        AppError::MalformedSession(format!("session {} has no answer payload", detail.id))
    })?;

    let answers: Vec<FormAnswer> = serde_json::from_str(answers_json).map_err(|e| {
        AppError::MalformedSession(format!("session {} answers undecodable: {}", detail.id, e))
    })?;

    Ok((form_id, answers))
}

/// Approve a manual-pay registration, creating its ledger entry exactly
/// once.
///
/// The idempotency key here is the registration id - there is no processor
/// payment reference on this path. Approving twice returns the settled
/// registration without double-counting revenue. The ledger entry is
/// created `pending`: the commission owed to the platform is reconciled
/// out of band, separately from the mentor already holding the money.
pub fn approve_manual(
    conn: &mut Connection,
    events: &dyn EventSink,
    registration_id: &str,
) -> Result<Registration> {
    let registration =
        queries::get_registration(conn, registration_id)?.or_not_found(msg::REGISTRATION_NOT_FOUND)?;

    // Rejection is terminal.
    if registration.status == RegistrationStatus::Rejected {
        return Err(AppError::Conflict(msg::ALREADY_REJECTED.into()));
    }

    // Fast path: already settled.
    if queries::get_ledger_entry_by_registration(conn, registration_id)?.is_some() {
        return queries::get_registration(conn, registration_id)?
            .or_not_found(msg::REGISTRATION_NOT_FOUND);
    }

    let form = queries::get_event_form(conn, &registration.form_id)?
        .ok_or_else(|| AppError::Internal(format!("Registration {} has no form", registration_id)))?;
    let mentor = queries::get_mentor(conn, &form.mentor_id)?
        .ok_or_else(|| AppError::Internal(format!("Form {} has no mentor", form.id)))?;

    let amount = form.price_cents;
    // Commission is computed from the plan tier at approval time.
    let platform_fee = plans::platform_fee_cents(amount, mentor.plan_tier);

    let tx = conn.transaction()?;

    queries::mark_registration_paid(&tx, registration_id)?;

    if let Err(e) = queries::create_ledger_entry(
        &tx,
        &CreateLedgerEntry {
            mentor_id: mentor.id.clone(),
            form_id: form.id.clone(),
            registration_id: registration_id.to_string(),
            amount_cents: amount,
            currency: form.currency.clone(),
            // The mentor already holds the full amount; the fee is what
            // they owe the platform.
            platform_fee_cents: platform_fee,
            mentor_earnings_cents: amount,
            status: LedgerStatus::Pending,
            payment_method: PaymentMethod::Manual,
            external_payment_ref: None,
        },
    ) {
        if e.is_unique_violation() {
            drop(tx);
            return queries::get_registration(conn, registration_id)?
                .or_not_found(msg::REGISTRATION_NOT_FOUND);
        }
        return Err(e);
    }

    tx.commit()?;

    events.emit(&DomainEvent::RegistrationPaid {
        registration_id: registration_id.to_string(),
        form_id: form.id.clone(),
        mentor_id: mentor.id.clone(),
        amount_cents: amount,
        currency: form.currency.clone(),
    });
    events.emit(&DomainEvent::RegistrationDecided {
        registration_id: registration_id.to_string(),
        status: RegistrationStatus::Approved,
    });

    tracing::info!(
        "Manual approval settled: registration={}, amount={}, fee_owed={}",
        registration_id,
        amount,
        platform_fee
    );

    queries::get_registration(conn, registration_id)?.or_not_found(msg::REGISTRATION_NOT_FOUND)
}

/// Reject a registration. Terminal; never creates a ledger entry, and a
/// settled registration cannot be rejected.
pub fn reject_registration(
    conn: &Connection,
    events: &dyn EventSink,
    registration_id: &str,
) -> Result<Registration> {
    let registration =
        queries::get_registration(conn, registration_id)?.or_not_found(msg::REGISTRATION_NOT_FOUND)?;

    if queries::get_ledger_entry_by_registration(conn, registration_id)?.is_some() {
        return Err(AppError::Conflict(msg::ALREADY_SETTLED.into()));
    }

    if registration.status != RegistrationStatus::Rejected {
        queries::set_registration_status(conn, registration_id, RegistrationStatus::Rejected)?;
        events.emit(&DomainEvent::RegistrationDecided {
            registration_id: registration_id.to_string(),
            status: RegistrationStatus::Rejected,
        });
    }

    queries::get_registration(conn, registration_id)?.or_not_found(msg::REGISTRATION_NOT_FOUND)
}
