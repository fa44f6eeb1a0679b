use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod clients;
mod config;
mod domain;
mod http;
mod metrics;
mod services;
mod store;
mod utils;

use clients::{HttpCarrierApi, HttpNotifier, HttpPaymentGatewayApi};
use config::AppConfig;
use http::AppState;
use services::{BalanceService, CheckoutService, PaymentService, QuoteService, ShipmentService};
use store::postgres::PgSaleStore;
use store::SaleStore;

/// Per-request timeout towards every external provider.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sales_engine=debug")),
        )
        .init();

    tracing::info!("🚀 Starting sales engine");

    // === 1. Configuration ===
    let config = AppConfig::load()?;
    config.validate()?;

    // === 2. Database pool and migrations ===
    tracing::info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store: Arc<dyn SaleStore> = Arc::new(PgSaleStore::new(pool));

    // === 3. Provider clients (retry + circuit breaker per provider) ===
    let carrier = Arc::new(HttpCarrierApi::new(
        config.carrier.base_url.clone(),
        config.carrier.api_key.clone(),
        PROVIDER_TIMEOUT,
    )?);
    let gateway = Arc::new(HttpPaymentGatewayApi::new(
        config.gateway.base_url.clone(),
        config.gateway.api_key.clone(),
        PROVIDER_TIMEOUT,
    )?);
    let notifier = Arc::new(HttpNotifier::new(
        config.notifier.base_url.clone(),
        PROVIDER_TIMEOUT,
    )?);

    // === 4. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // === 5. Services ===
    let state = web::Data::new(AppState {
        checkout: CheckoutService::new(
            store.clone(),
            gateway.clone(),
            carrier.clone(),
            config.shipping.quote_policy(),
        ),
        payments: PaymentService::new(
            store.clone(),
            gateway,
            notifier,
            config.gateway.webhook_secret.clone(),
        ),
        shipments: ShipmentService::new(store.clone(), carrier.clone()),
        quotes: QuoteService::new(carrier, config.shipping.quote_policy()),
        reports: BalanceService::new(store),
        metrics,
    });

    // === 6. HTTP server ===
    tracing::info!(
        "📡 API listening on http://{}:{}",
        config.server.host,
        config.server.port
    );
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(http::json_config())
            .app_data(http::path_config())
            .configure(http::routes)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
