//! Prefixed ID generation for Rollcall entities.
//!
//! All IDs use an `rc_` brand prefix to guarantee collision avoidance with
//! payment processor IDs (`acct_`, `cs_`, `pi_`, etc.).
//!
//! Format: `rc_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["rc_mnt_", "rc_frm_", "rc_reg_", "rc_txn_"];

/// Entity types that carry prefixed IDs.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Mentor,
    Form,
    Registration,
    LedgerEntry,
}

impl EntityType {
    fn prefix(self) -> &'static str {
        match self {
            Self::Mentor => "rc_mnt_",
            Self::Form => "rc_frm_",
            Self::Registration => "rc_reg_",
            Self::LedgerEntry => "rc_txn_",
        }
    }
}

/// Generate a new prefixed ID for the given entity type.
pub fn new_id(entity: EntityType) -> String {
    format!("{}{}", entity.prefix(), Uuid::new_v4().simple())
}

/// Validate that a string is a well-formed Rollcall prefixed ID.
///
/// Cheap format check to reject garbage before hitting the database.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}
