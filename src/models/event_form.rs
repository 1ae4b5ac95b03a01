use serde::{Deserialize, Serialize};

/// A published sign-up form and its payment configuration.
///
/// Read-only for the payment subsystem; form building and theming live in
/// the form service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventForm {
    pub id: String,
    pub mentor_id: String,
    pub title: String,
    /// Whether this form collects money at all.
    pub payment_enabled: bool,
    /// Ticket price in minor units.
    pub price_cents: i64,
    /// ISO 4217 currency code (lowercase, e.g., "usd").
    pub currency: String,
    /// Whether payment runs through the hosted processor checkout.
    /// When false on a paid form, the manual payment-proof path applies.
    pub processor_enabled: bool,
    /// Whether manual-pay submissions must attach a proof image.
    pub require_proof: bool,
    pub created_at: i64,
}

impl EventForm {
    /// Paid form settled through the hosted checkout.
    pub fn is_processor_paid(&self) -> bool {
        self.payment_enabled && self.processor_enabled
    }

    /// Paid form settled by a human approving an uploaded proof.
    pub fn is_manual_paid(&self) -> bool {
        self.payment_enabled && !self.processor_enabled
    }
}

/// Data required to create a form record.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventForm {
    pub title: String,
    #[serde(default)]
    pub payment_enabled: bool,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub processor_enabled: bool,
    #[serde(default)]
    pub require_proof: bool,
}

fn default_currency() -> String {
    "usd".to_string()
}
