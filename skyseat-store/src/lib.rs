pub mod app_config;
pub mod database;
pub mod events;
pub mod flight_repo;
pub mod record;
pub mod redis_repo;

pub use database::DbClient;
pub use events::{EventProducer, KafkaNotifier};
pub use flight_repo::PostgresFlightStore;
pub use redis_repo::{RedisClient, RedisFlightStore};
