use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::connect;
use crate::db::{queries, AppState};
use crate::error::AppError;
use crate::fulfillment;
use crate::payments::{AccountStatus, WebhookAccount, WebhookEnvelope, WebhookSession};

/// Result type for webhook operations: status plus a short reason the
/// processor dashboard can display.
pub type WebhookResult = (StatusCode, &'static str);

/// Asynchronous fulfillment path.
///
/// Signature verification runs against the untouched raw body before any
/// JSON parsing - the processor signs the exact byte stream. Delivery is
/// at-least-once; everything downstream is idempotent, so duplicates are
/// acknowledged rather than deduplicated here. Only transient failures
/// return 5xx (the processor's retry policy redelivers); permanent ones
/// are acknowledged after logging so they do not retry forever.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "Missing signature header");
    };

    match state.processor.verify_webhook_signature(&body, signature) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::BAD_REQUEST, "Invalid signature"),
        Err(e) => {
            tracing::debug!("Unparseable webhook signature: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
    }

    let event: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("Failed to parse webhook payload: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(&state, &event).await,
        "account.updated" => handle_account_updated(&state, &event).await,
        _ => (StatusCode::OK, "Ignored"),
    }
}

async fn handle_checkout_completed(state: &AppState, event: &WebhookEnvelope) -> WebhookResult {
    let session: WebhookSession = match serde_json::from_value(event.data.object.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to parse checkout session event: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid checkout session");
        }
    };

    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Pool error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable");
        }
    };

    match fulfillment::fulfill_checkout(
        &mut conn,
        state.processor.as_ref(),
        state.events.as_ref(),
        &session.id,
    )
    .await
    {
        Ok(registration) => {
            tracing::info!(
                "Webhook fulfilled session {} -> registration {}",
                session.id,
                registration.id
            );
            (StatusCode::OK, "OK")
        }
        // The session completed without a confirmed payment; redelivery
        // cannot change that.
        Err(AppError::PaymentNotConfirmed) => (StatusCode::OK, "Session not paid"),
        // Already logged for manual reconciliation; acknowledge so the
        // processor does not retry a permanently bad payload.
        Err(AppError::MalformedSession(_)) => (StatusCode::OK, "Unprocessable session"),
        Err(AppError::Upstream(e)) => {
            tracing::error!("Processor error during webhook fulfillment: {}", e);
            (StatusCode::BAD_GATEWAY, "Processor error")
        }
        Err(e) => {
            tracing::error!("Webhook fulfillment failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Fulfillment failed")
        }
    }
}

async fn handle_account_updated(state: &AppState, event: &WebhookEnvelope) -> WebhookResult {
    let account: WebhookAccount = match serde_json::from_value(event.data.object.clone()) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Failed to parse account event: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid account");
        }
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Pool error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable");
        }
    };

    let mentor = match queries::get_mentor_by_payment_account(&conn, &account.id) {
        Ok(Some(m)) => m,
        // An account we never provisioned; nothing to sync.
        Ok(None) => return (StatusCode::OK, "Unknown account"),
        Err(e) => {
            tracing::error!("DB error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let status = AccountStatus {
        details_submitted: account.details_submitted,
        charges_enabled: account.charges_enabled,
    };

    match connect::apply_account_status(&conn, state.events.as_ref(), &mentor, status) {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!("Failed to sync account status: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Sync failed")
        }
    }
}
