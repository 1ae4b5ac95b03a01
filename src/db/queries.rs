use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::id::{new_id, EntityType};
use crate::models::*;
use crate::plans::PlanTier;

use super::from_row::{
    query_all, query_one, EVENT_FORM_COLS, LEDGER_ENTRY_COLS, MENTOR_COLS, REGISTRATION_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Mentors ============

pub fn create_mentor(conn: &Connection, input: &CreateMentor) -> Result<MentorAccount> {
    let id = new_id(EntityType::Mentor);
    let ts = now();

    conn.execute(
        "INSERT INTO mentors (id, email, name, plan_tier, onboarding_complete, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
        params![&id, &input.email, &input.name, input.plan_tier.as_str(), ts],
    )?;

    Ok(MentorAccount {
        id,
        email: input.email.clone(),
        name: input.name.clone(),
        plan_tier: input.plan_tier,
        payment_account_id: None,
        onboarding_complete: false,
        created_at: ts,
        updated_at: ts,
    })
}

pub fn get_mentor(conn: &Connection, id: &str) -> Result<Option<MentorAccount>> {
    query_one(
        conn,
        &format!("SELECT {} FROM mentors WHERE id = ?1", MENTOR_COLS),
        &[&id],
    )
}

pub fn get_mentor_by_payment_account(
    conn: &Connection,
    payment_account_id: &str,
) -> Result<Option<MentorAccount>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM mentors WHERE payment_account_id = ?1",
            MENTOR_COLS
        ),
        &[&payment_account_id],
    )
}

pub fn set_mentor_payment_account(
    conn: &Connection,
    mentor_id: &str,
    payment_account_id: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE mentors SET payment_account_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![payment_account_id, now(), mentor_id],
    )?;
    Ok(())
}

/// Persist the readiness flag. Callers check for change first so repeated
/// webhook/polling syncs do not churn `updated_at`.
pub fn set_mentor_onboarding(conn: &Connection, mentor_id: &str, complete: bool) -> Result<()> {
    conn.execute(
        "UPDATE mentors SET onboarding_complete = ?1, updated_at = ?2 WHERE id = ?3",
        params![complete, now(), mentor_id],
    )?;
    Ok(())
}

pub fn set_mentor_plan_tier(conn: &Connection, mentor_id: &str, tier: PlanTier) -> Result<()> {
    conn.execute(
        "UPDATE mentors SET plan_tier = ?1, updated_at = ?2 WHERE id = ?3",
        params![tier.as_str(), now(), mentor_id],
    )?;
    Ok(())
}

// ============ Event Forms ============

pub fn create_event_form(
    conn: &Connection,
    mentor_id: &str,
    input: &CreateEventForm,
) -> Result<EventForm> {
    let id = new_id(EntityType::Form);
    let ts = now();

    conn.execute(
        "INSERT INTO event_forms (id, mentor_id, title, payment_enabled, price_cents, currency, processor_enabled, require_proof, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            mentor_id,
            &input.title,
            input.payment_enabled,
            input.price_cents,
            &input.currency,
            input.processor_enabled,
            input.require_proof,
            ts
        ],
    )?;

    Ok(EventForm {
        id,
        mentor_id: mentor_id.to_string(),
        title: input.title.clone(),
        payment_enabled: input.payment_enabled,
        price_cents: input.price_cents,
        currency: input.currency.clone(),
        processor_enabled: input.processor_enabled,
        require_proof: input.require_proof,
        created_at: ts,
    })
}

pub fn get_event_form(conn: &Connection, id: &str) -> Result<Option<EventForm>> {
    query_one(
        conn,
        &format!("SELECT {} FROM event_forms WHERE id = ?1", EVENT_FORM_COLS),
        &[&id],
    )
}

// ============ Registrations ============

/// Insert a registration row.
///
/// When `external_payment_ref` is set, the sparse UNIQUE index makes this
/// the first half of the fulfillment engine's exactly-once guarantee: a
/// duplicate insert fails with a uniqueness violation the caller converts
/// into "already fulfilled".
pub fn create_registration(conn: &Connection, input: &CreateRegistration) -> Result<Registration> {
    let id = new_id(EntityType::Registration);
    let ts = now();
    let data_json = serde_json::to_string(&input.data)?;

    conn.execute(
        "INSERT INTO registrations (id, form_id, data, payment_proof_url, status, payment_status, external_payment_ref, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            &id,
            &input.form_id,
            &data_json,
            &input.payment_proof_url,
            input.status.as_str(),
            input.payment_status.as_str(),
            &input.external_payment_ref,
            ts
        ],
    )?;

    Ok(Registration {
        id,
        form_id: input.form_id.clone(),
        data: input.data.clone(),
        payment_proof_url: input.payment_proof_url.clone(),
        status: input.status,
        payment_status: input.payment_status,
        external_payment_ref: input.external_payment_ref.clone(),
        created_at: ts,
        updated_at: ts,
    })
}

pub fn get_registration(conn: &Connection, id: &str) -> Result<Option<Registration>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM registrations WHERE id = ?1",
            REGISTRATION_COLS
        ),
        &[&id],
    )
}

pub fn get_registration_by_payment_ref(
    conn: &Connection,
    payment_ref: &str,
) -> Result<Option<Registration>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM registrations WHERE external_payment_ref = ?1",
            REGISTRATION_COLS
        ),
        &[&payment_ref],
    )
}

pub fn set_registration_status(
    conn: &Connection,
    id: &str,
    status: RegistrationStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE registrations SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now(), id],
    )?;
    Ok(())
}

/// Approve a registration and mark it paid in one statement (manual path).
pub fn mark_registration_paid(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE registrations SET status = 'approved', payment_status = 'paid', updated_at = ?1 WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(())
}

// ============ Ledger Entries ============

/// Insert a ledger entry.
///
/// The UNIQUE indexes on `external_payment_ref` (processor path) and
/// `registration_id` (manual path) are the authority of last resort for
/// exactly-once settlement; callers treat a uniqueness violation as
/// "another caller won", not as an error.
pub fn create_ledger_entry(conn: &Connection, input: &CreateLedgerEntry) -> Result<LedgerEntry> {
    let id = new_id(EntityType::LedgerEntry);
    let ts = now();

    conn.execute(
        "INSERT INTO ledger_entries (id, mentor_id, form_id, registration_id, amount_cents, currency, platform_fee_cents, mentor_earnings_cents, status, payment_method, external_payment_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            &id,
            &input.mentor_id,
            &input.form_id,
            &input.registration_id,
            input.amount_cents,
            &input.currency,
            input.platform_fee_cents,
            input.mentor_earnings_cents,
            input.status.as_str(),
            input.payment_method.as_str(),
            &input.external_payment_ref,
            ts
        ],
    )?;

    Ok(LedgerEntry {
        id,
        mentor_id: input.mentor_id.clone(),
        form_id: input.form_id.clone(),
        registration_id: input.registration_id.clone(),
        amount_cents: input.amount_cents,
        currency: input.currency.clone(),
        platform_fee_cents: input.platform_fee_cents,
        mentor_earnings_cents: input.mentor_earnings_cents,
        status: input.status,
        payment_method: input.payment_method,
        external_payment_ref: input.external_payment_ref.clone(),
        created_at: ts,
    })
}

pub fn get_ledger_entry_by_payment_ref(
    conn: &Connection,
    payment_ref: &str,
) -> Result<Option<LedgerEntry>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM ledger_entries WHERE external_payment_ref = ?1",
            LEDGER_ENTRY_COLS
        ),
        &[&payment_ref],
    )
}

pub fn get_ledger_entry_by_registration(
    conn: &Connection,
    registration_id: &str,
) -> Result<Option<LedgerEntry>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM ledger_entries WHERE registration_id = ?1",
            LEDGER_ENTRY_COLS
        ),
        &[&registration_id],
    )
}

pub fn list_ledger_entries_for_mentor(
    conn: &Connection,
    mentor_id: &str,
) -> Result<Vec<LedgerEntry>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM ledger_entries WHERE mentor_id = ?1 ORDER BY created_at DESC",
            LEDGER_ENTRY_COLS
        ),
        &[&mentor_id],
    )
}

/// Sum a mentor's completed ledger entries, grouped by currency.
/// An empty ledger yields zeros, not an error.
pub fn mentor_earnings(conn: &Connection, mentor_id: &str) -> Result<EarningsSummary> {
    let mut stmt = conn.prepare(
        "SELECT currency,
                SUM(amount_cents),
                SUM(mentor_earnings_cents),
                SUM(platform_fee_cents),
                COUNT(*)
         FROM ledger_entries
         WHERE mentor_id = ?1 AND status = 'completed'
         GROUP BY currency
         ORDER BY currency",
    )?;

    let mut by_currency = Vec::new();
    let mut completed_count = 0i64;

    let rows = stmt.query_map(params![mentor_id], |row| {
        Ok((
            CurrencyEarnings {
                currency: row.get(0)?,
                amount_cents: row.get(1)?,
                mentor_earnings_cents: row.get(2)?,
                platform_fee_cents: row.get(3)?,
            },
            row.get::<_, i64>(4)?,
        ))
    })?;

    for row in rows {
        let (earnings, count) = row?;
        completed_count += count;
        by_currency.push(earnings);
    }

    Ok(EarningsSummary {
        by_currency,
        completed_count,
    })
}
