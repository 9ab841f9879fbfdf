//! Retention daemon: runs the janitor loop against the shared Postgres
//! ledger, purging attempts past the retention horizon.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use verigate::models::PolicyConfig;
use verigate::services::janitor::RetentionJanitor;
use verigate::storage::PgAttemptStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let formatting_layer = BunyanFormattingLayer::new("verigate".into(), std::io::stdout);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "verigate=info".into()))
        .with(JsonStorageLayer)
        .with(formatting_layer)
        .init();

    let database_url =
        std::env::var("DATABASE_URL").expect("Env variable `DATABASE_URL` should be set");
    let db_pool = PgPoolOptions::new()
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let policy = PolicyConfig::from_env().expect("Invalid throttle policy configuration");
    let janitor = RetentionJanitor::new(Arc::new(PgAttemptStore::new(db_pool)), policy);
    janitor.spawn_purge_task();

    info!("Retention janitor running");
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    info!("Shutting down");
}
