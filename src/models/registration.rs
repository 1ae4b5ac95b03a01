use serde::{Deserialize, Serialize};

/// One answered key/value pair from a submitted form.
///
/// Answers are kept as an ordered sequence rather than a map so the
/// participant's field order survives serialization round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormAnswer {
    pub key: String,
    pub value: String,
}

/// A participant's submission to a form.
///
/// Created immediately for free and manual-pay forms, or only upon
/// confirmed payment for processor-backed checkouts, so abandoned
/// checkouts never leave orphan registrations behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub form_id: String,
    pub data: Vec<FormAnswer>,
    pub payment_proof_url: Option<String>,
    pub status: RegistrationStatus,
    pub payment_status: PaymentStatus,
    /// Processor payment-intent id; unique when present. This is the
    /// idempotency key for processor-driven fulfillment.
    pub external_payment_ref: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a registration.
#[derive(Debug, Clone)]
pub struct CreateRegistration {
    pub form_id: String,
    pub data: Vec<FormAnswer>,
    pub payment_proof_url: Option<String>,
    pub status: RegistrationStatus,
    pub payment_status: PaymentStatus,
    pub external_payment_ref: Option<String>,
}

/// Admin/mentor decision state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(Self::Unpaid),
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
