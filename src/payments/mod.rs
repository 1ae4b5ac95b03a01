//! Payment processor capability.
//!
//! All processor I/O goes through the [`PaymentProcessor`] trait so request
//! handlers never touch a concrete client. Production wires in
//! [`StripeClient`]; tests substitute a deterministic fake.

mod stripe;

pub use stripe::{StripeClient, WebhookAccount, WebhookEnvelope, WebhookEventData, WebhookSession};

use async_trait::async_trait;

use crate::error::Result;

/// Metadata keys carried on a checkout session.
///
/// The registration record must not exist until payment is confirmed, so
/// the participant's draft answers ride along in processor metadata and are
/// decoded back out at fulfillment time.
pub const META_FORM_ID: &str = "form_id";
pub const META_ANSWERS: &str = "answers";

/// Readiness flags of a connected sub-merchant account, as reported by the
/// processor. Onboarding is complete when both are true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountStatus {
    pub details_submitted: bool,
    pub charges_enabled: bool,
}

impl AccountStatus {
    pub fn is_ready(&self) -> bool {
        self.details_submitted && self.charges_enabled
    }
}

/// Inputs for building a hosted checkout session with a split settlement.
#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub form_id: String,
    pub form_title: String,
    pub price_cents: i64,
    /// ISO 4217, lowercase.
    pub currency: String,
    /// Portion of the sale retained by the platform, in minor units.
    pub application_fee_cents: i64,
    /// Connected account receiving the remainder.
    pub destination_account: String,
    /// Serialized draft answers (JSON array of key/value pairs).
    pub answers_json: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A freshly created hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Authoritative session detail re-fetched from the processor at
/// fulfillment time. Amounts come from here, never from client input.
#[derive(Debug, Clone, Default)]
pub struct SessionDetail {
    pub id: String,
    /// "paid", "unpaid", or "no_payment_required".
    pub payment_status: String,
    /// The payment-intent id; the idempotency key for fulfillment.
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    /// Fee carried on the underlying payment intent (set at session
    /// creation time from the mentor's then-current plan tier).
    pub application_fee_cents: Option<i64>,
    pub form_id: Option<String>,
    pub answers_json: Option<String>,
}

impl SessionDetail {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a connected sub-merchant account for a mentor.
    async fn create_account(&self, email: &str) -> Result<String>;

    /// Issue a hosted onboarding link for an existing connected account.
    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String>;

    /// Fetch the authoritative readiness flags for a connected account.
    async fn account_status(&self, account_id: &str) -> Result<AccountStatus>;

    /// Create a hosted checkout session splitting funds between the
    /// platform and the mentor's connected account. No local side effects.
    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession>;

    /// Re-fetch full session detail; fulfillment trusts only this.
    async fn checkout_session(&self, session_id: &str) -> Result<SessionDetail>;

    /// Verify a webhook signature against the untouched raw body.
    ///
    /// Must run before any parsing of the body; processors sign the exact
    /// byte stream.
    fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> Result<bool>;
}
