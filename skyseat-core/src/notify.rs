use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::NotifyError;

/// Reservation-confirmed message handed to the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatReservedMessage {
    pub flight_id: String,
    pub flight_departure: String,
    pub seat_letter: String,
    pub seat_row: i32,
    #[serde(rename = "user_id")]
    pub passenger_id: String,
    pub reserved_at: i64,
}

/// Outbound channel for committed reservations. Best effort: the engine logs
/// a failed publish and keeps the reservation.
#[async_trait]
pub trait ReservationNotifier: Send + Sync {
    async fn publish(&self, message: &SeatReservedMessage) -> Result<(), NotifyError>;
}

/// In-process fan-out over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<SeatReservedMessage>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeatReservedMessage> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl ReservationNotifier for BroadcastNotifier {
    async fn publish(&self, message: &SeatReservedMessage) -> Result<(), NotifyError> {
        self.tx
            .send(message.clone())
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers)
    }
}
