use kameo::Actor;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flashsale_query::actors::CorrelationRegistry;
use flashsale_query::config::Config;
use flashsale_query::domain::flashsale::{Flashsale, QueryFilter};
use flashsale_query::identifiers::{DeviceId, FlashId, ItemId};
use flashsale_query::messaging::{RedpandaBus, Subscription};
use flashsale_query::metrics::{self, Metrics};
use flashsale_query::query::{QueryDispatcher, ResponseListener};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,flashsale_query=debug")),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "No .env file loaded");
    }

    tracing::info!("🚀 Starting flashsale query service");

    // === 1. Configuration ===
    let config = Config::from_env()?;
    tracing::info!(
        brokers = %config.kafka.bootstrap_servers(),
        events = %config.kafka.producer_event_topic,
        responses = %config.kafka.producer_response_topic,
        timeout_secs = config.query_timeout.as_secs(),
        "Configuration loaded"
    );

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        let server = metrics::start_metrics_server(metrics_registry, metrics_port);
        if let Err(e) = system.block_on(server) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 3. Bus ===
    let bus = Arc::new(
        RedpandaBus::builder()
            .brokers(config.kafka.bootstrap_servers())
            .build()?,
    );

    {
        let bus = bus.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                interval.tick().await;
                metrics.set_circuit_state(bus.circuit_state().await.as_gauge());
            }
        });
    }

    // === 4. Registry and response listener ===
    let registry =
        CorrelationRegistry::spawn(CorrelationRegistry::new().with_metrics(metrics.clone()));

    let listener = ResponseListener::new(
        bus.clone(),
        Subscription::new(
            config.kafka.producer_response_topic.clone(),
            config.kafka.response_consumer_group.clone(),
        ),
        registry.clone(),
    )
    .with_metrics(metrics.clone())
    .spawn()
    .await?;

    let dispatcher = QueryDispatcher::new(bus, registry, config.kafka.producer_event_topic.clone())
        .with_timeout(config.query_timeout)
        .with_metrics(metrics);

    // === 5. Insert a flashsale, then read it back ===
    let flashsale = Flashsale {
        upc: 4_011,
        sku: "BAN-001".to_string(),
        name: "Bananas".to_string(),
        origin: "Ecuador".to_string(),
        price: 0.69,
        sale_price: 0.49,
        timestamp: chrono::Utc::now().timestamp(),
        total_weight: 1_200.0,
        lot: "L-2026-10".to_string(),
        status: "active".to_string(),
        ..Flashsale::new(FlashId::new_v4(), ItemId::new_v4(), DeviceId::new_v4())
    };

    let time_uuid = dispatcher.insert(&flashsale).await?;
    tracing::info!(time_uuid = %time_uuid, flash_id = %flashsale.flash_id, "✅ Insert published");

    tokio::time::sleep(Duration::from_secs(2)).await;

    match dispatcher
        .query(&QueryFilter::new().flash_id(flashsale.flash_id))
        .await
    {
        Ok(found) => {
            for sale in &found {
                tracing::info!(
                    id = ?sale.id.map(|id| id.to_hex()),
                    name = %sale.name,
                    sale_price = sale.sale_price,
                    remaining = sale.remaining_weight(),
                    "📦 Flashsale"
                );
            }
            tracing::info!(matches = found.len(), "🎉 Query complete");
        }
        Err(e) if e.is_timeout() => {
            tracing::warn!(error = %e, "⏳ No executor answered in time");
        }
        Err(e) => return Err(e.into()),
    }

    listener.abort();
    Ok(())
}
