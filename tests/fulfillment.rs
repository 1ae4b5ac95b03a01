//! Order fulfillment engine tests: exactly-once settlement under duplicate
//! and racing payment-confirmation signals.

mod common;

use common::*;
use rollcall::fulfillment;

fn paid_session(id: &str, payment_intent: &str, form_id: &str, amount: i64, fee: i64) -> SessionDetail {
    SessionDetail {
        id: id.to_string(),
        payment_status: "paid".to_string(),
        payment_intent: Some(payment_intent.to_string()),
        amount_total: Some(amount),
        currency: Some("usd".to_string()),
        application_fee_cents: Some(fee),
        form_id: Some(form_id.to_string()),
        answers_json: Some(sample_answers_json()),
    }
}

#[tokio::test]
async fn fulfillment_creates_one_registration_and_one_ledger_entry() {
    let mut conn = setup_test_db();
    let processor = FakeProcessor::new();
    let sink = CollectingSink::new();

    let mentor = create_test_mentor(&conn, "m@example.com", PlanTier::Pro);
    let form = create_processor_form(&conn, &mentor.id, 500);
    processor.insert_session(paid_session("cs_1", "pi_1", &form.id, 500, 50));

    let registration = fulfillment::fulfill_checkout(&mut conn, &processor, &sink, "cs_1")
        .await
        .expect("fulfillment should succeed");

    assert_eq!(registration.status, RegistrationStatus::Approved);
    assert_eq!(registration.payment_status, PaymentStatus::Paid);
    assert_eq!(registration.external_payment_ref.as_deref(), Some("pi_1"));
    assert_eq!(registration.data, sample_answers());

    let entry = queries::get_ledger_entry_by_payment_ref(&conn, "pi_1")
        .unwrap()
        .expect("ledger entry should exist");
    assert_eq!(entry.registration_id, registration.id);
    assert_eq!(entry.amount_cents, 500);
    assert_eq!(entry.platform_fee_cents, 50);
    assert_eq!(entry.mentor_earnings_cents, 450);
    assert_eq!(entry.status, LedgerStatus::Completed);
    assert_eq!(entry.payment_method, PaymentMethod::Processor);

    assert_eq!(count_rows(&conn, "registrations"), 1);
    assert_eq!(count_rows(&conn, "ledger_entries"), 1);
}

#[tokio::test]
async fn duplicate_fulfillment_returns_same_registration() {
    let mut conn = setup_test_db();
    let processor = FakeProcessor::new();
    let sink = CollectingSink::new();

    let mentor = create_test_mentor(&conn, "m@example.com", PlanTier::Pro);
    let form = create_processor_form(&conn, &mentor.id, 500);
    processor.insert_session(paid_session("cs_1", "pi_1", &form.id, 500, 50));

    // Webhook then verify (or verify then refresh): both land here.
    let first = fulfillment::fulfill_checkout(&mut conn, &processor, &sink, "cs_1")
        .await
        .unwrap();
    let second = fulfillment::fulfill_checkout(&mut conn, &processor, &sink, "cs_1")
        .await
        .unwrap();
    let third = fulfillment::fulfill_checkout(&mut conn, &processor, &sink, "cs_1")
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.id, third.id);
    assert_eq!(count_rows(&conn, "registrations"), 1);
    assert_eq!(count_rows(&conn, "ledger_entries"), 1);

    // Exactly one paid event despite three signals
    let paid_events = sink
        .events()
        .iter()
        .filter(|e| matches!(e, DomainEvent::RegistrationPaid { .. }))
        .count();
    assert_eq!(paid_events, 1);
}

#[tokio::test]
async fn lost_insert_race_returns_winners_record_without_error() {
    let mut conn = setup_test_db();
    let processor = FakeProcessor::new();
    let sink = CollectingSink::new();

    let mentor = create_test_mentor(&conn, "m@example.com", PlanTier::Pro);
    let form = create_processor_form(&conn, &mentor.id, 500);
    processor.insert_session(paid_session("cs_1", "pi_1", &form.id, 500, 50));

    // Simulate a concurrent winner committing its registration between this
    // caller's ledger lookup and its insert: the row already carries the
    // payment ref, so our insert trips the UNIQUE index.
    let winner = queries::create_registration(
        &conn,
        &CreateRegistration {
            form_id: form.id.clone(),
            data: sample_answers(),
            payment_proof_url: None,
            status: RegistrationStatus::Approved,
            payment_status: PaymentStatus::Paid,
            external_payment_ref: Some("pi_1".to_string()),
        },
    )
    .unwrap();

    let result = fulfillment::fulfill_checkout(&mut conn, &processor, &sink, "cs_1")
        .await
        .expect("losing branch must not surface an error");

    assert_eq!(result.id, winner.id);
    assert_eq!(count_rows(&conn, "registrations"), 1);
}

#[tokio::test]
async fn unpaid_session_is_not_fulfilled() {
    let mut conn = setup_test_db();
    let processor = FakeProcessor::new();
    let sink = CollectingSink::new();

    let mentor = create_test_mentor(&conn, "m@example.com", PlanTier::Pro);
    let form = create_processor_form(&conn, &mentor.id, 500);

    // Abandoned checkout: the session exists but was never paid.
    let mut detail = paid_session("cs_1", "pi_1", &form.id, 500, 50);
    detail.payment_status = "unpaid".to_string();
    detail.payment_intent = None;
    processor.insert_session(detail);

    let err = fulfillment::fulfill_checkout(&mut conn, &processor, &sink, "cs_1")
        .await
        .expect_err("unpaid session must not fulfill");
    assert!(matches!(err, AppError::PaymentNotConfirmed));

    assert_eq!(count_rows(&conn, "registrations"), 0);
    assert_eq!(count_rows(&conn, "ledger_entries"), 0);
}

#[tokio::test]
async fn missing_metadata_is_malformed_not_guessed() {
    let mut conn = setup_test_db();
    let processor = FakeProcessor::new();
    let sink = CollectingSink::new();

    let mentor = create_test_mentor(&conn, "m@example.com", PlanTier::Pro);
    let form = create_processor_form(&conn, &mentor.id, 500);

    let mut detail = paid_session("cs_1", "pi_1", &form.id, 500, 50);
    detail.form_id = None;
    processor.insert_session(detail);

    let err = fulfillment::fulfill_checkout(&mut conn, &processor, &sink, "cs_1")
        .await
        .expect_err("sessions without a form id must not fulfill");
    assert!(matches!(err, AppError::MalformedSession(_)));
    assert_eq!(count_rows(&conn, "registrations"), 0);
}

#[tokio::test]
async fn corrupt_answers_are_malformed() {
    let mut conn = setup_test_db();
    let processor = FakeProcessor::new();
    let sink = CollectingSink::new();

    let mentor = create_test_mentor(&conn, "m@example.com", PlanTier::Pro);
    let form = create_processor_form(&conn, &mentor.id, 500);

    let mut detail = paid_session("cs_1", "pi_1", &form.id, 500, 50);
    detail.answers_json = Some("{not json".to_string());
    processor.insert_session(detail);

    let err = fulfillment::fulfill_checkout(&mut conn, &processor, &sink, "cs_1")
        .await
        .expect_err("undecodable answers must not fulfill");
    assert!(matches!(err, AppError::MalformedSession(_)));
    assert_eq!(count_rows(&conn, "registrations"), 0);
}

#[tokio::test]
async fn unknown_form_in_metadata_is_malformed() {
    let mut conn = setup_test_db();
    let processor = FakeProcessor::new();
    let sink = CollectingSink::new();

    processor.insert_session(paid_session("cs_1", "pi_1", "rc_frm_missing", 500, 50));

    let err = fulfillment::fulfill_checkout(&mut conn, &processor, &sink, "cs_1")
        .await
        .expect_err("unknown form must not fulfill");
    assert!(matches!(err, AppError::MalformedSession(_)));
    assert_eq!(count_rows(&conn, "registrations"), 0);
}

#[tokio::test]
async fn pro_plan_scenario_end_to_end() {
    // Mentor on the pro plan (10%) sells a 500-unit ticket; the session is
    // built by the checkout builder, then both delivery channels fire.
    use axum::extract::State;
    use rollcall::extractors::Json;
    use rollcall::handlers::{create_checkout, verify_payment, CreateCheckoutRequest, VerifyRequest};

    let processor = std::sync::Arc::new(FakeProcessor::new());
    let sink = std::sync::Arc::new(CollectingSink::new());
    let state = create_test_app_state(processor.clone(), sink.clone());

    let form_id = {
        let conn = state.db.get().unwrap();
        let mentor = create_test_mentor(&conn, "pro@example.com", PlanTier::Pro);
        onboard_test_mentor(&conn, &mentor.id, "acct_1");
        create_processor_form(&conn, &mentor.id, 500).id
    };

    let checkout = create_checkout(
        State(state.clone()),
        Json(CreateCheckoutRequest {
            form_id: form_id.clone(),
            answers: sample_answers(),
            currency: None,
        }),
    )
    .await
    .expect("checkout should build")
    .0;

    processor.complete_payment(&checkout.session_id, "pi_pro_1");

    // Verify endpoint and a duplicate "webhook-shaped" fulfillment both run.
    let verified = verify_payment(
        State(state.clone()),
        Json(VerifyRequest {
            session_id: checkout.session_id.clone(),
        }),
    )
    .await
    .expect("verify should succeed")
    .0;

    let again = verify_payment(
        State(state.clone()),
        Json(VerifyRequest {
            session_id: checkout.session_id.clone(),
        }),
    )
    .await
    .expect("repeat verify should succeed")
    .0;

    assert_eq!(verified.registration_id, again.registration_id);

    let conn = state.db.get().unwrap();
    let entry = queries::get_ledger_entry_by_payment_ref(&conn, "pi_pro_1")
        .unwrap()
        .expect("one ledger entry");
    assert_eq!(entry.amount_cents, 500);
    assert_eq!(entry.platform_fee_cents, 50);
    assert_eq!(entry.mentor_earnings_cents, 450);
    assert_eq!(entry.status, LedgerStatus::Completed);
    assert_eq!(count_rows(&conn, "ledger_entries"), 1);
}

#[tokio::test]
async fn stray_verify_for_abandoned_checkout_confirms_nothing() {
    use axum::extract::State;
    use rollcall::extractors::Json;
    use rollcall::handlers::{create_checkout, verify_payment, CreateCheckoutRequest, VerifyRequest};

    let processor = std::sync::Arc::new(FakeProcessor::new());
    let sink = std::sync::Arc::new(CollectingSink::new());
    let state = create_test_app_state(processor.clone(), sink.clone());

    let form_id = {
        let conn = state.db.get().unwrap();
        let mentor = create_test_mentor(&conn, "pro@example.com", PlanTier::Pro);
        onboard_test_mentor(&conn, &mentor.id, "acct_1");
        create_processor_form(&conn, &mentor.id, 500).id
    };

    let checkout = create_checkout(
        State(state.clone()),
        Json(CreateCheckoutRequest {
            form_id,
            answers: sample_answers(),
            currency: None,
        }),
    )
    .await
    .unwrap()
    .0;

    // Participant walks away; no payment ever happens.
    let err = verify_payment(
        State(state.clone()),
        Json(VerifyRequest {
            session_id: checkout.session_id,
        }),
    )
    .await
    .expect_err("abandoned checkout must not verify");
    assert!(matches!(err, AppError::PaymentNotConfirmed));

    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "registrations"), 0);
}
