use serde::{Deserialize, Serialize};

use crate::plans::PlanTier;

/// A mentor who publishes registration forms and receives split payouts.
///
/// `payment_account_id` and `onboarding_complete` mirror the connected
/// sub-merchant account at the processor; they are written only by the
/// connected-account manager (explicit polling or `account.updated` events).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorAccount {
    pub id: String,
    pub email: String,
    pub name: String,
    pub plan_tier: PlanTier,
    pub payment_account_id: Option<String>,
    pub onboarding_complete: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a mentor record.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMentor {
    pub email: String,
    pub name: String,
    #[serde(default = "default_tier")]
    pub plan_tier: PlanTier,
}

fn default_tier() -> PlanTier {
    PlanTier::Starter
}
