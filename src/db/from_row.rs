//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;
use crate::plans::PlanTier;

/// Parse a string column into an enum, converting parse failures to
/// rusqlite errors instead of panicking on corrupt rows.
fn parse_enum<T>(
    row: &Row,
    col: usize,
    col_name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const MENTOR_COLS: &str =
    "id, email, name, plan_tier, payment_account_id, onboarding_complete, created_at, updated_at";

pub const EVENT_FORM_COLS: &str = "id, mentor_id, title, payment_enabled, price_cents, currency, processor_enabled, require_proof, created_at";

pub const REGISTRATION_COLS: &str = "id, form_id, data, payment_proof_url, status, payment_status, external_payment_ref, created_at, updated_at";

pub const LEDGER_ENTRY_COLS: &str = "id, mentor_id, form_id, registration_id, amount_cents, currency, platform_fee_cents, mentor_earnings_cents, status, payment_method, external_payment_ref, created_at";

// ============ FromRow impls ============

impl FromRow for MentorAccount {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(MentorAccount {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            // Unknown tiers fall back to the highest-fee tier rather than
            // failing the row; fee math must never silently become zero.
            plan_tier: PlanTier::from_str_lossy(&row.get::<_, String>(3)?),
            payment_account_id: row.get(4)?,
            onboarding_complete: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for EventForm {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(EventForm {
            id: row.get(0)?,
            mentor_id: row.get(1)?,
            title: row.get(2)?,
            payment_enabled: row.get(3)?,
            price_cents: row.get(4)?,
            currency: row.get(5)?,
            processor_enabled: row.get(6)?,
            require_proof: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for Registration {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let data_json: String = row.get(2)?;
        let data: Vec<FormAnswer> = serde_json::from_str(&data_json).map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "data".to_string(), rusqlite::types::Type::Text)
        })?;
        Ok(Registration {
            id: row.get(0)?,
            form_id: row.get(1)?,
            data,
            payment_proof_url: row.get(3)?,
            status: parse_enum(row, 4, "status", RegistrationStatus::from_str)?,
            payment_status: parse_enum(row, 5, "payment_status", PaymentStatus::from_str)?,
            external_payment_ref: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for LedgerEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LedgerEntry {
            id: row.get(0)?,
            mentor_id: row.get(1)?,
            form_id: row.get(2)?,
            registration_id: row.get(3)?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            platform_fee_cents: row.get(6)?,
            mentor_earnings_cents: row.get(7)?,
            status: parse_enum(row, 8, "status", LedgerStatus::from_str)?,
            payment_method: parse_enum(row, 9, "payment_method", PaymentMethod::from_str)?,
            external_payment_ref: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}
