use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payments not available: {0}")]
    NotPayable(String),

    #[error("Organizer is not ready to accept payments")]
    MentorNotReady,

    #[error("No payment account provisioned for this mentor")]
    NotProvisioned,

    #[error("Payment has not been confirmed by the processor")]
    PaymentNotConfirmed,

    #[error("Malformed checkout session: {0}")]
    MalformedSession(String),

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Payment processor error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is a storage-level uniqueness violation.
    ///
    /// The fulfillment engine relies on the UNIQUE indexes on
    /// `external_payment_ref` and `registration_id` as its race backstop:
    /// a losing concurrent insert surfaces here and is converted into
    /// "fetch the winner's record", never into a caller-visible error.
    pub fn is_unique_violation(&self) -> bool {
        // 2067 = SQLITE_CONSTRAINT_UNIQUE, 1555 = SQLITE_CONSTRAINT_PRIMARYKEY
        matches!(
            self,
            AppError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && (e.extended_code == 2067 || e.extended_code == 1555)
        )
    }
}

/// Message constants shared between handlers and tests.
pub mod msg {
    pub const MENTOR_NOT_FOUND: &str = "Mentor not found";
    pub const FORM_NOT_FOUND: &str = "Form not found";
    pub const REGISTRATION_NOT_FOUND: &str = "Registration not found";
    pub const PROOF_REQUIRED: &str = "A payment proof image is required for this form";
    pub const ALREADY_REJECTED: &str = "Registration has been rejected";
    pub const ALREADY_SETTLED: &str = "Registration has already been settled";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature header format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature header";
}

/// Convert `Option<T>` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(msg.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::NotPayable(msg) => (
                StatusCode::BAD_REQUEST,
                "Payments not available",
                Some(msg.clone()),
            ),
            AppError::MentorNotReady => (
                StatusCode::CONFLICT,
                "Organizer is not ready to accept payments",
                None,
            ),
            AppError::NotProvisioned => (
                StatusCode::CONFLICT,
                "No payment account provisioned for this mentor",
                None,
            ),
            AppError::PaymentNotConfirmed => {
                (StatusCode::PAYMENT_REQUIRED, "Payment not confirmed", None)
            }
            AppError::MalformedSession(msg) => {
                tracing::error!("Malformed checkout session, manual reconciliation needed: {}", msg);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Malformed checkout session",
                    None,
                )
            }
            AppError::SignatureInvalid => {
                (StatusCode::BAD_REQUEST, "Invalid webhook signature", None)
            }
            AppError::Upstream(msg) => {
                tracing::error!("Payment processor error: {}", msg);
                // Processor message passed through verbatim for support triage
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment processor error",
                    Some(msg.clone()),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
