//! Plancraft entitlement service binary.
//!
//! Loads configuration, wires the adapters, and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use plancraft::adapters::email::ResendNotifier;
use plancraft::adapters::http::entitlement::{entitlement_routes, EntitlementAppState};
use plancraft::adapters::http::webhook::{webhook_routes, WebhookAppState};
use plancraft::adapters::postgres::PostgresEntitlementStore;
use plancraft::adapters::stripe::{StripeConfig, StripeGateway};
use plancraft::application::{ProcessWebhookHandler, QuotaGate, SessionReconciler};
use plancraft::config::AppConfig;
use plancraft::domain::webhook::{RejectionCounters, WebhookProcessor, WebhookVerifier};
use plancraft::ports::{EntitlementStore, PaymentProvider, UpgradeNotifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.server.log_level))
        .json()
        .init();

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!().run(&pool).await?;
    }

    let store: Arc<dyn EntitlementStore> = Arc::new(PostgresEntitlementStore::new(pool));
    let notifier: Arc<dyn UpgradeNotifier> = Arc::new(ResendNotifier::new(&config.email));
    let payment_provider: Arc<dyn PaymentProvider> = Arc::new(StripeGateway::new(
        StripeConfig::new(
            config.payment.stripe_api_key.clone(),
            config.payment.stripe_premium_price_id.clone(),
        ),
    ));

    let verifier = WebhookVerifier::new(config.payment.webhook_secrets());
    let processor = WebhookProcessor::new(
        store.clone(),
        notifier,
        config.payment.cancellation_policy,
        config.payment.grace_period_days,
    );
    let webhook_handler = Arc::new(ProcessWebhookHandler::new(
        verifier,
        processor,
        Arc::new(RejectionCounters::new()),
    ));

    let reconciler = Arc::new(
        SessionReconciler::new(store.clone())
            .with_max_snapshot_age(config.entitlement.snapshot_max_age()),
    );
    let quota_gate = Arc::new(
        QuotaGate::new(store.clone()).with_store_timeout(config.entitlement.store_timeout()),
    );

    let webhook_router =
        webhook_routes().with_state(WebhookAppState {
            handler: webhook_handler,
        });
    let entitlement_router = entitlement_routes().with_state(EntitlementAppState {
        reconciler,
        quota_gate,
        payment_provider,
    });

    let cors = {
        let origins: Vec<HeaderValue> = config
            .server
            .cors_origins_list()
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        if origins.is_empty() {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    let app = Router::new()
        .nest("/api/webhooks", webhook_router)
        .nest("/api/entitlement", entitlement_router)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors);

    let addr = config.server.socket_addr();
    tracing::info!(%addr, "plancraft entitlement service listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
