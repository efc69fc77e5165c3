//! Storefront Orders - cart, pricing and order lifecycle service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_orders::api::{self, AppState};
use storefront_orders::auth::StaticTokenAuthority;
use storefront_orders::config::AppConfig;
use storefront_orders::notify::{EventPublisher, LogPublisher, NatsPublisher};
use storefront_orders::orders::{OrderAdmin, OrderService};
use storefront_orders::storage::{CatalogReader, InMemoryStore, OrderRepository, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "storefront_orders=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (catalog, repo): (Arc<dyn CatalogReader>, Arc<dyn OrderRepository>) = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = Arc::new(PgStore::new(pool));
            store.migrate().await?;
            (store.clone() as Arc<dyn CatalogReader>, store as Arc<dyn OrderRepository>)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; orders are kept in memory and lost on restart");
            let store = Arc::new(InMemoryStore::new());
            (store.clone() as Arc<dyn CatalogReader>, store as Arc<dyn OrderRepository>)
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => {
                tracing::info!(url = %url, "Connected to NATS");
                Arc::new(NatsPublisher::new(client))
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "NATS unavailable; order events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let state = AppState {
        catalog,
        orders: Arc::new(OrderService::new(repo.clone(), events.clone(), config.shipping)),
        admin: Arc::new(OrderAdmin::new(repo, Arc::new(StaticTokenAuthority::new(config.admin_token.clone())), events)),
    };
    let app = api::router(state);

    let addr = config.socket_addr();
    tracing::info!("Storefront orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
