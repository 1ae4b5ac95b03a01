mod checkout;
mod connect;
mod earnings;
mod registrations;
mod verify;
mod webhook;

pub use checkout::*;
pub use connect::*;
pub use earnings::*;
pub use registrations::*;
pub use verify::*;
pub use webhook::*;

use axum::{
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/checkout/create", post(create_checkout))
        .route("/payment/verify", post(verify_payment))
        .route("/webhook", post(handle_webhook))
        .route("/connect/onboarding", post(start_onboarding))
        .route("/connect/status", get(connect_status))
        .route("/forms/{form_id}/registrations", post(submit_registration))
        .route("/registrations/{id}/status", patch(decide_registration))
        .route("/mentors/{id}/earnings", get(mentor_earnings))
}
