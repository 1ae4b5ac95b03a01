use rusqlite::Connection;

/// Initialize the database schema.
///
/// The two sparse UNIQUE indexes on `external_payment_ref` and the UNIQUE
/// index on `ledger_entries.registration_id` are load-bearing: they are the
/// storage-level backstop that makes duplicate fulfillment attempts collapse
/// into a single record.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Mentors (organizers; identity fields owned by the account service,
        -- payment columns owned by the connected-account manager)
        CREATE TABLE IF NOT EXISTS mentors (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            plan_tier TEXT NOT NULL DEFAULT 'starter',
            payment_account_id TEXT,
            onboarding_complete INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_mentors_payment_account
            ON mentors(payment_account_id) WHERE payment_account_id IS NOT NULL;

        -- Event forms (payment configuration is read-only here)
        CREATE TABLE IF NOT EXISTS event_forms (
            id TEXT PRIMARY KEY,
            mentor_id TEXT NOT NULL REFERENCES mentors(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            payment_enabled INTEGER NOT NULL DEFAULT 0,
            price_cents INTEGER NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'usd',
            processor_enabled INTEGER NOT NULL DEFAULT 0,
            require_proof INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_event_forms_mentor ON event_forms(mentor_id);

        -- Registrations (submissions)
        -- data: ordered key/value answer pairs, JSON
        CREATE TABLE IF NOT EXISTS registrations (
            id TEXT PRIMARY KEY,
            form_id TEXT NOT NULL REFERENCES event_forms(id) ON DELETE CASCADE,
            data TEXT NOT NULL DEFAULT '[]',
            payment_proof_url TEXT,
            status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
            payment_status TEXT NOT NULL CHECK (payment_status IN ('unpaid', 'pending', 'paid')),
            external_payment_ref TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_registrations_form ON registrations(form_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_registrations_payment_ref
            ON registrations(external_payment_ref) WHERE external_payment_ref IS NOT NULL;

        -- Ledger entries (one per registration that became paid)
        CREATE TABLE IF NOT EXISTS ledger_entries (
            id TEXT PRIMARY KEY,
            mentor_id TEXT NOT NULL REFERENCES mentors(id),
            form_id TEXT NOT NULL REFERENCES event_forms(id),
            registration_id TEXT NOT NULL REFERENCES registrations(id),
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            platform_fee_cents INTEGER NOT NULL,
            mentor_earnings_cents INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed')),
            payment_method TEXT NOT NULL CHECK (payment_method IN ('processor', 'manual')),
            external_payment_ref TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_payment_ref
            ON ledger_entries(external_payment_ref) WHERE external_payment_ref IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_registration
            ON ledger_entries(registration_id);
        CREATE INDEX IF NOT EXISTS idx_ledger_mentor_status
            ON ledger_entries(mentor_id, status);
        "#,
    )?;
    Ok(())
}
