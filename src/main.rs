//! Storefront Cart - cart and checkout service

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_cart::service::{seed, EventPublisher, NatsPublisher, NoopPublisher};
use storefront_cart::{router, MemoryStore, PgStore, ServerConfig, Storefront, StorefrontStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let store: Arc<dyn StorefrontStore> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url, config.max_connections).await.context("connecting to postgres")?),
        None => {
            tracing::warn!("DATABASE_URL not set, carts and orders are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    if config.seed_catalog {
        let seeded = seed::seed_catalog(store.as_ref()).await.context("seeding catalog")?;
        if seeded > 0 {
            tracing::info!(products = seeded, "seeded catalog");
        }
    }

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(error) => {
                tracing::warn!(%error, "NATS unavailable, domain events are not published");
                Arc::new(NoopPublisher)
            }
        },
        None => Arc::new(NoopPublisher),
    };

    let app = router(Storefront::new(store, events));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Storefront cart listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
