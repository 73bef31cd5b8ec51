use std::path::Path;
use std::sync::Arc;
use anyhow::Context;
use serde::Deserialize;
use skyseat_core::{
    BroadcastNotifier, Flight, FlightStore, MemoryFlightStore, ReservationNotifier, Seat,
    SeatReservedMessage, StoreError,
};
use skyseat_store::app_config::{Config, NotifierBackend, StoreBackend};
use skyseat_store::{DbClient, EventProducer, KafkaNotifier, PostgresFlightStore, RedisClient, RedisFlightStore};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::state::AppState;

/// Seed entry: the availability flag is derived from the seats, never read.
#[derive(Debug, Deserialize)]
struct SeedFlight {
    id: String,
    departure: String,
    seats: Vec<Seat>,
}

pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store = build_store(config).await?;

    if let Some(path) = &config.store.seed_file {
        let count = seed_flights(store.as_ref(), Path::new(path)).await?;
        info!("Seeded {} flights from {}", count, path);
    }

    let notifier = build_notifier(config)?;
    Ok(AppState::new(store, notifier))
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn FlightStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryFlightStore::new())),
        StoreBackend::Postgres => {
            let database = config
                .database
                .as_ref()
                .context("store.backend = \"postgres\" requires a [database] section")?;
            let db = DbClient::new(&database.url, database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Ok(Arc::new(PostgresFlightStore::new(db.pool)))
        }
        StoreBackend::Redis => {
            let redis = config
                .redis
                .as_ref()
                .context("store.backend = \"redis\" requires a [redis] section")?;
            let client = RedisClient::new(&redis.url)
                .await
                .context("Failed to create Redis client")?;
            Ok(Arc::new(RedisFlightStore::new(client)))
        }
    }
}

fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn ReservationNotifier>> {
    match config.notifications.backend {
        NotifierBackend::Log => {
            let notifier = BroadcastNotifier::new(256);
            tokio::spawn(log_confirmations(notifier.subscribe()));
            Ok(Arc::new(notifier))
        }
        NotifierBackend::Kafka => {
            let kafka = config
                .kafka
                .as_ref()
                .context("notifications.backend = \"kafka\" requires a [kafka] section")?;
            let producer = EventProducer::new(&kafka.brokers)
                .context("Failed to create Kafka producer")?;
            Ok(Arc::new(KafkaNotifier::new(producer, config.notifications.topic.clone())))
        }
    }
}

/// Save every flight listed in a JSON seed file that the store does not
/// already hold. Existing records carry committed reservations and are left
/// alone. Returns how many were written.
pub async fn seed_flights(store: &dyn FlightStore, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let seeds: Vec<SeedFlight> = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed seed file {}", path.display()))?;

    let mut written = 0;
    for seed in seeds {
        match store.find(&seed.id).await {
            Ok(_) => {
                info!("Flight {} already stored, skipping seed entry", seed.id);
                continue;
            }
            Err(StoreError::FlightNotFound(_)) => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to look up flight {}", seed.id)),
        }

        let flight = Flight::new(seed.id, seed.departure, seed.seats);
        store.save(&flight).await?;
        written += 1;
    }

    Ok(written)
}

async fn log_confirmations(mut rx: broadcast::Receiver<SeatReservedMessage>) {
    loop {
        match rx.recv().await {
            Ok(msg) => info!(
                "Reservation confirmed: passenger {} has seat {}{} on flight {} departing {}",
                msg.passenger_id, msg.seat_row, msg.seat_letter, msg.flight_id, msg.flight_departure
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Confirmation log fell behind, skipped {} messages", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
