use serde::{Deserialize, Serialize};

/// One revenue record per registration that became paid.
///
/// Processor entries satisfy `platform_fee_cents + mentor_earnings_cents ==
/// amount_cents`. Manual entries satisfy `mentor_earnings_cents ==
/// amount_cents` (the mentor already holds the money); `platform_fee_cents`
/// is the amount owed to the platform, reconciled out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub mentor_id: String,
    pub form_id: String,
    pub registration_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub platform_fee_cents: i64,
    pub mentor_earnings_cents: i64,
    pub status: LedgerStatus,
    pub payment_method: PaymentMethod,
    /// Processor payment-intent id for processor entries; the idempotency
    /// key. Manual entries key on `registration_id` instead.
    pub external_payment_ref: Option<String>,
    pub created_at: i64,
}

/// Data required to create a ledger entry.
#[derive(Debug, Clone)]
pub struct CreateLedgerEntry {
    pub mentor_id: String,
    pub form_id: String,
    pub registration_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub platform_fee_cents: i64,
    pub mentor_earnings_cents: i64,
    pub status: LedgerStatus,
    pub payment_method: PaymentMethod,
    pub external_payment_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Pending,
    Completed,
    Failed,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Processor,
    Manual,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processor => "processor",
            Self::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "processor" => Some(Self::Processor),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Completed earnings for a single currency.
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyEarnings {
    /// ISO 4217 currency code (lowercase)
    pub currency: String,
    pub amount_cents: i64,
    pub mentor_earnings_cents: i64,
    pub platform_fee_cents: i64,
}

/// Read-only rollup of a mentor's completed ledger entries, grouped by
/// currency (amounts cannot be summed across currencies).
#[derive(Debug, Clone, Serialize)]
pub struct EarningsSummary {
    pub by_currency: Vec<CurrencyEarnings>,
    pub completed_count: i64,
}
