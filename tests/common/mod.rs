//! Test utilities and fixtures for Rollcall integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use rollcall::db::{init_db, queries, AppState};
pub use rollcall::error::AppError;
pub use rollcall::events::{DomainEvent, EventSink};
pub use rollcall::models::*;
pub use rollcall::payments::{
    AccountStatus, CheckoutParams, CheckoutSession, PaymentProcessor, SessionDetail,
};
pub use rollcall::plans::PlanTier;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test mentor on the given plan
pub fn create_test_mentor(conn: &Connection, email: &str, tier: PlanTier) -> MentorAccount {
    queries::create_mentor(
        conn,
        &CreateMentor {
            email: email.to_string(),
            name: format!("Test Mentor {}", email),
            plan_tier: tier,
        },
    )
    .expect("Failed to create test mentor")
}

/// Attach a connected account and mark onboarding complete
pub fn onboard_test_mentor(conn: &Connection, mentor_id: &str, account_id: &str) {
    queries::set_mentor_payment_account(conn, mentor_id, account_id)
        .expect("Failed to set payment account");
    queries::set_mentor_onboarding(conn, mentor_id, true).expect("Failed to set onboarding");
}

/// Create a processor-paid form (hosted checkout)
pub fn create_processor_form(conn: &Connection, mentor_id: &str, price_cents: i64) -> EventForm {
    queries::create_event_form(
        conn,
        mentor_id,
        &CreateEventForm {
            title: "Test Workshop".to_string(),
            payment_enabled: true,
            price_cents,
            currency: "usd".to_string(),
            processor_enabled: true,
            require_proof: false,
        },
    )
    .expect("Failed to create test form")
}

/// Create a manual-pay form (proof upload + human approval)
pub fn create_manual_form(
    conn: &Connection,
    mentor_id: &str,
    price_cents: i64,
    require_proof: bool,
) -> EventForm {
    queries::create_event_form(
        conn,
        mentor_id,
        &CreateEventForm {
            title: "Manual Pay Workshop".to_string(),
            payment_enabled: true,
            price_cents,
            currency: "usd".to_string(),
            processor_enabled: false,
            require_proof,
        },
    )
    .expect("Failed to create test form")
}

/// Create a free form (no payment at all)
pub fn create_free_form(conn: &Connection, mentor_id: &str) -> EventForm {
    queries::create_event_form(
        conn,
        mentor_id,
        &CreateEventForm {
            title: "Free Meetup".to_string(),
            payment_enabled: false,
            price_cents: 0,
            currency: "usd".to_string(),
            processor_enabled: false,
            require_proof: false,
        },
    )
    .expect("Failed to create test form")
}

/// Create a pending manual-pay registration with a proof image attached
pub fn create_pending_registration(conn: &Connection, form_id: &str) -> Registration {
    queries::create_registration(
        conn,
        &CreateRegistration {
            form_id: form_id.to_string(),
            data: sample_answers(),
            payment_proof_url: Some("https://files.example.com/proof.png".to_string()),
            status: RegistrationStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            external_payment_ref: None,
        },
    )
    .expect("Failed to create test registration")
}

pub fn sample_answers() -> Vec<FormAnswer> {
    vec![
        FormAnswer {
            key: "name".to_string(),
            value: "Ada".to_string(),
        },
        FormAnswer {
            key: "email".to_string(),
            value: "ada@example.com".to_string(),
        },
    ]
}

pub fn sample_answers_json() -> String {
    serde_json::to_string(&sample_answers()).expect("Failed to serialize answers")
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("Failed to count rows")
}

// ============ Event sink double ============

/// Event sink that records everything it sees.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &DomainEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============ Payment processor double ============

/// Deterministic in-memory payment processor.
///
/// Checkout sessions start unpaid; tests flip them to paid with
/// `complete_payment` to simulate the participant finishing checkout.
#[derive(Default)]
pub struct FakeProcessor {
    sessions: Mutex<HashMap<String, SessionDetail>>,
    accounts: Mutex<HashMap<String, AccountStatus>>,
    counter: AtomicU32,
    pub create_account_calls: AtomicU32,
    /// When set, account creation fails with this message.
    pub account_error: Mutex<Option<String>>,
    /// Whether webhook signatures verify (default true).
    accept_signatures: AtomicBool,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self {
            accept_signatures: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn reject_signatures(&self) {
        self.accept_signatures.store(false, Ordering::SeqCst);
    }

    pub fn fail_account_creation(&self, message: &str) {
        *self.account_error.lock().unwrap() = Some(message.to_string());
    }

    /// Register a session directly, bypassing the builder.
    pub fn insert_session(&self, detail: SessionDetail) {
        self.sessions
            .lock()
            .unwrap()
            .insert(detail.id.clone(), detail);
    }

    /// Simulate the participant completing payment for a session.
    pub fn complete_payment(&self, session_id: &str, payment_intent: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(session_id)
            .expect("completing payment for unknown session");
        session.payment_status = "paid".to_string();
        session.payment_intent = Some(payment_intent.to_string());
    }

    /// Mark a connected account's readiness flags.
    pub fn set_account_status(&self, account_id: &str, status: AccountStatus) {
        self.accounts
            .lock()
            .unwrap()
            .insert(account_id.to_string(), status);
    }

    pub fn session(&self, session_id: &str) -> Option<SessionDetail> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn next(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_account(&self, _email: &str) -> rollcall::error::Result<String> {
        self.create_account_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.account_error.lock().unwrap().clone() {
            return Err(AppError::Upstream(message));
        }
        let id = format!("acct_test_{}", self.next());
        self.accounts.lock().unwrap().insert(
            id.clone(),
            AccountStatus {
                details_submitted: false,
                charges_enabled: false,
            },
        );
        Ok(id)
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> rollcall::error::Result<String> {
        Ok(format!("https://connect.fake/onboarding/{}", account_id))
    }

    async fn account_status(&self, account_id: &str) -> rollcall::error::Result<AccountStatus> {
        self.accounts
            .lock()
            .unwrap()
            .get(account_id)
            .copied()
            .ok_or_else(|| AppError::Upstream(format!("No such account: {}", account_id)))
    }

    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> rollcall::error::Result<CheckoutSession> {
        let id = format!("cs_test_{}", self.next());
        self.sessions.lock().unwrap().insert(
            id.clone(),
            SessionDetail {
                id: id.clone(),
                payment_status: "unpaid".to_string(),
                payment_intent: None,
                amount_total: Some(params.price_cents),
                currency: Some(params.currency.clone()),
                application_fee_cents: Some(params.application_fee_cents),
                form_id: Some(params.form_id.clone()),
                answers_json: Some(params.answers_json.clone()),
            },
        );
        Ok(CheckoutSession {
            url: format!("https://checkout.fake/{}", id),
            id,
        })
    }

    async fn checkout_session(&self, session_id: &str) -> rollcall::error::Result<SessionDetail> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::Upstream(format!("No such session: {}", session_id)))
    }

    fn verify_webhook_signature(
        &self,
        _payload: &[u8],
        _signature_header: &str,
    ) -> rollcall::error::Result<bool> {
        Ok(self.accept_signatures.load(Ordering::SeqCst))
    }
}

// ============ AppState ============

/// Create an AppState backed by a single shared in-memory connection.
///
/// The pool is capped at one connection so every handler call sees the same
/// database. Fixture code must release its pooled connection before a
/// handler runs.
pub fn create_test_app_state(
    processor: Arc<FakeProcessor>,
    events: Arc<CollectingSink>,
) -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        processor,
        events,
        base_url: "http://localhost:3000".to_string(),
        checkout_success_url: "http://localhost:3000/checkout/success".to_string(),
        checkout_cancel_url: "http://localhost:3000/checkout/cancel".to_string(),
    }
}
