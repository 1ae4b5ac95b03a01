//! Connected-account management: provisioning sub-merchant accounts for
//! mentors, issuing onboarding links, and mirroring the processor's
//! readiness flags onto the mentor record.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::events::{DomainEvent, EventSink};
use crate::models::MentorAccount;
use crate::payments::{AccountStatus, PaymentProcessor};

/// Result of [`provision_account`].
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    pub account_id: String,
    /// False when the mentor already had an account and the existing id was
    /// returned (informational, not an error).
    pub created: bool,
}

/// Create a connected account for the mentor, or return the existing one.
///
/// Safe to call repeatedly: a mentor who already has an account gets its id
/// back with `created == false`. Processor failures surface as `Upstream`.
pub async fn provision_account(
    conn: &mut Connection,
    processor: &dyn PaymentProcessor,
    mentor: &MentorAccount,
) -> Result<ProvisionedAccount> {
    if let Some(ref account_id) = mentor.payment_account_id {
        return Ok(ProvisionedAccount {
            account_id: account_id.clone(),
            created: false,
        });
    }

    let account_id = processor.create_account(&mentor.email).await?;
    queries::set_mentor_payment_account(conn, &mentor.id, &account_id)?;

    tracing::info!(
        "Provisioned connected account {} for mentor {}",
        account_id,
        mentor.id
    );

    Ok(ProvisionedAccount {
        account_id,
        created: true,
    })
}

/// Issue a hosted onboarding link for the mentor's connected account.
pub async fn onboarding_link(
    processor: &dyn PaymentProcessor,
    mentor: &MentorAccount,
    refresh_url: &str,
    return_url: &str,
) -> Result<String> {
    let account_id = mentor
        .payment_account_id
        .as_deref()
        .ok_or(AppError::NotProvisioned)?;

    processor
        .create_onboarding_link(account_id, refresh_url, return_url)
        .await
}

/// Fetch the processor's readiness flags and mirror them onto the mentor.
pub async fn sync_onboarding_status(
    conn: &mut Connection,
    processor: &dyn PaymentProcessor,
    events: &dyn EventSink,
    mentor: &MentorAccount,
) -> Result<AccountStatus> {
    let account_id = mentor
        .payment_account_id
        .as_deref()
        .ok_or(AppError::NotProvisioned)?;

    let status = processor.account_status(account_id).await?;
    apply_account_status(conn, events, mentor, status)?;
    Ok(status)
}

/// Persist `onboarding_complete` from processor truth, writing only on
/// change.
///
/// Called from both the status-polling endpoint and the `account.updated`
/// webhook; the flag is a pure function of upstream state, so the two call
/// sites converge regardless of ordering.
pub fn apply_account_status(
    conn: &Connection,
    events: &dyn EventSink,
    mentor: &MentorAccount,
    status: AccountStatus,
) -> Result<bool> {
    let ready = status.is_ready();
    if ready == mentor.onboarding_complete {
        return Ok(false);
    }

    queries::set_mentor_onboarding(conn, &mentor.id, ready)?;
    tracing::info!(
        "Mentor {} onboarding_complete: {} -> {}",
        mentor.id,
        mentor.onboarding_complete,
        ready
    );

    if ready {
        events.emit(&DomainEvent::MentorAccountReady {
            mentor_id: mentor.id.clone(),
        });
    }

    Ok(true)
}
