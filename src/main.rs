use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall::config::Config;
use rollcall::db::{create_pool, init_db, queries, AppState};
use rollcall::events::TracingSink;
use rollcall::handlers;
use rollcall::models::{CreateEventForm, CreateMentor};
use rollcall::payments::StripeClient;
use rollcall::plans::PlanTier;

#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(about = "Payment orchestration for event registration forms")]
struct Cli {
    /// Seed the database with dev data (a mentor and two forms)
    #[arg(long)]
    seed: bool,
}

/// Seeds the database with dev data for manual testing.
/// Creates a pro-tier mentor, a processor-paid form, and a manual-pay form.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM mentors", [], |row| row.get(0))
        .expect("Failed to count mentors");
    if existing > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let mentor = queries::create_mentor(
        &conn,
        &CreateMentor {
            email: "dev@rollcall.local".to_string(),
            name: "Dev Mentor".to_string(),
            plan_tier: PlanTier::Pro,
        },
    )
    .expect("Failed to create dev mentor");

    let processor_form = queries::create_event_form(
        &conn,
        &mentor.id,
        &CreateEventForm {
            title: "Workshop Ticket".to_string(),
            payment_enabled: true,
            price_cents: 2500,
            currency: "usd".to_string(),
            processor_enabled: true,
            require_proof: false,
        },
    )
    .expect("Failed to create dev form");

    let manual_form = queries::create_event_form(
        &conn,
        &mentor.id,
        &CreateEventForm {
            title: "Bank Transfer Workshop".to_string(),
            payment_enabled: true,
            price_cents: 2500,
            currency: "usd".to_string(),
            processor_enabled: false,
            require_proof: true,
        },
    )
    .expect("Failed to create dev form");

    println!();
    println!("--- DEV DATA ---");
    println!("  mentor_id: {}", mentor.id);
    println!("  processor_form_id: {}", processor_form.id);
    println!("  manual_form_id: {}", manual_form.id);
    println!("--- END ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        processor: Arc::new(StripeClient::new(&config.stripe)),
        events: Arc::new(TracingSink),
        base_url: config.base_url.clone(),
        checkout_success_url: config.checkout_success_url.clone(),
        checkout_cancel_url: config.checkout_cancel_url.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set ROLLCALL_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Rollcall server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
