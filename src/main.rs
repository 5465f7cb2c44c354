//! Storefront Orders - order lifecycle service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_orders::payment::{PaymentBridge, StripeBridge};
use storefront_orders::publisher::EventPublisher;
use storefront_orders::store::PgStore;
use storefront_orders::{api, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will only be logged");
                None
            }
        },
        None => None,
    };
    let payments: Option<Arc<dyn PaymentBridge>> = match &config.stripe_secret_key {
        Some(key) => Some(Arc::new(StripeBridge::new(key.clone()))),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, checkout runs in demo mode");
            None
        }
    };

    let addr = config.bind_addr();
    let state = AppState::new(config, Arc::new(PgStore::new(db)), payments, EventPublisher::new(nats));
    let app = api::router(state);

    tracing::info!("🚀 Storefront Orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
