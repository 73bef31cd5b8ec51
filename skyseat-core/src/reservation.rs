use std::sync::Arc;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::{is_valid_passenger_id, Flight};
use crate::notify::{ReservationNotifier, SeatReservedMessage};
use crate::store::{ClaimOutcome, FlightStore, SeatClaim};
use crate::{ReservationError, ReservationResult};

/// A committed seat claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub flight_id: String,
    pub departure: String,
    pub seat_id: String,
    pub seat_letter: String,
    pub seat_row: i32,
    pub passenger_id: String,
    /// This claim took the last open seat on the flight.
    pub flight_full: bool,
}

impl Reservation {
    fn message(&self) -> SeatReservedMessage {
        SeatReservedMessage {
            flight_id: self.flight_id.clone(),
            flight_departure: self.departure.clone(),
            seat_letter: self.seat_letter.clone(),
            seat_row: self.seat_row,
            passenger_id: self.passenger_id.clone(),
            reserved_at: Utc::now().timestamp(),
        }
    }
}

/// Claims seats for passengers.
///
/// Reads the flight, validates the target seat, then issues exactly one
/// conditional write. No locks are held between the read and the write and
/// nothing is retried: a rejected write is reported as `SeatNotAvailable`.
pub struct ReservationEngine {
    store: Arc<dyn FlightStore>,
    notifier: Arc<dyn ReservationNotifier>,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn FlightStore>, notifier: Arc<dyn ReservationNotifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn reserve_seat(
        &self,
        flight_id: &str,
        seat_id: &str,
        passenger_id: &str,
    ) -> ReservationResult<Reservation> {
        if !is_valid_passenger_id(passenger_id) {
            return Err(ReservationError::InvalidPassenger(passenger_id.to_string()));
        }

        // 1. Current state
        let flight = self.store.find(flight_id).await?;

        // 2-4. Optimistic pre-check
        let (seat_index, remaining) = locate_seat(&flight, seat_id).ok_or_else(|| {
            ReservationError::SeatNotFound {
                flight_id: flight_id.to_string(),
                seat_id: seat_id.to_string(),
            }
        })?;
        let seat = &flight.seats[seat_index];

        if !seat.is_free() || !flight.has_free_seats {
            return Err(not_available(flight_id, seat_id));
        }
        let last_open_seat = remaining == 1;

        // 5. The only atomic step
        let claim = SeatClaim {
            flight_id: flight.id.clone(),
            seat_index,
            seat_id: seat_id.to_string(),
            passenger_id: passenger_id.to_string(),
        };

        let flight_full = match self.store.claim_seat(&claim).await? {
            ClaimOutcome::Claimed { flight_full } => flight_full,
            ClaimOutcome::Rejected => {
                info!("Claim on seat {} of flight {} lost to a concurrent writer", seat_id, flight_id);
                return Err(not_available(flight_id, seat_id));
            }
        };

        if flight_full != last_open_seat {
            debug!(
                "Availability of flight {} changed since read (expected full: {}, stored full: {})",
                flight_id, last_open_seat, flight_full
            );
        }
        info!("Seat {} on flight {} reserved for {}", seat_id, flight_id, passenger_id);

        let reservation = Reservation {
            flight_id: flight.id.clone(),
            departure: flight.departure.clone(),
            seat_id: seat.id.clone(),
            seat_letter: seat.letter.clone(),
            seat_row: seat.row,
            passenger_id: passenger_id.to_string(),
            flight_full,
        };

        self.notify(&reservation).await;

        Ok(reservation)
    }

    async fn notify(&self, reservation: &Reservation) {
        if let Err(e) = self.notifier.publish(&reservation.message()).await {
            warn!(
                "Reservation of seat {} on flight {} committed but notification failed: {}",
                reservation.seat_id, reservation.flight_id, e
            );
        }
    }
}

/// Position of the first seat with `seat_id`, and how many seats are open
/// (the target included).
fn locate_seat(flight: &Flight, seat_id: &str) -> Option<(usize, usize)> {
    flight
        .seat(seat_id)
        .map(|(index, _)| (index, flight.open_seats()))
}

fn not_available(flight_id: &str, seat_id: &str) -> ReservationError {
    ReservationError::SeatNotAvailable {
        flight_id: flight_id.to_string(),
        seat_id: seat_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::memory::MemoryFlightStore;
    use crate::model::Seat;
    use crate::notify::BroadcastNotifier;
    use crate::NotifyError;

    struct FailingNotifier;

    #[async_trait]
    impl ReservationNotifier for FailingNotifier {
        async fn publish(&self, _message: &SeatReservedMessage) -> Result<(), NotifyError> {
            Err(NotifyError::Publish("broker unreachable".into()))
        }
    }

    async fn seeded_store() -> Arc<MemoryFlightStore> {
        let store = Arc::new(MemoryFlightStore::new());
        store
            .save(&Flight::new(
                "f2",
                "2019-11-26T09:05:00+0000",
                vec![Seat::new("s1", "A", 1), Seat::new("s2", "A", 1)],
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_reserve_until_flight_is_full() {
        let store = seeded_store().await;
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        let engine = ReservationEngine::new(store.clone(), Arc::new(notifier));

        let first = engine.reserve_seat("f2", "s1", "p1").await.unwrap();
        assert!(!first.flight_full);
        let stored = store.find("f2").await.unwrap();
        assert_eq!(stored.seats[0].passenger_id.as_deref(), Some("p1"));
        assert!(stored.has_free_seats);

        let second = engine.reserve_seat("f2", "s2", "p2").await.unwrap();
        assert!(second.flight_full);
        let stored = store.find("f2").await.unwrap();
        assert!(!stored.has_free_seats);
        assert!(stored.is_consistent());

        let third = engine.reserve_seat("f2", "s1", "p3").await.unwrap_err();
        assert!(matches!(third, ReservationError::SeatNotAvailable { .. }));

        let message = rx.recv().await.unwrap();
        assert_eq!(message.flight_id, "f2");
        assert_eq!(message.flight_departure, "2019-11-26T09:05:00+0000");
        assert_eq!(message.seat_letter, "A");
        assert_eq!(message.seat_row, 1);
        assert_eq!(message.passenger_id, "p1");
    }

    #[tokio::test]
    async fn test_taken_seat_is_never_overwritten() {
        let store = seeded_store().await;
        let engine = ReservationEngine::new(store.clone(), Arc::new(FailingNotifier));

        engine.reserve_seat("f2", "s1", "p1").await.unwrap();
        let err = engine.reserve_seat("f2", "s1", "p2").await.unwrap_err();
        assert!(matches!(err, ReservationError::SeatNotAvailable { .. }));

        let stored = store.find("f2").await.unwrap();
        assert_eq!(stored.seats[0].passenger_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_unknown_flight_and_seat() {
        let store = seeded_store().await;
        let engine = ReservationEngine::new(store, Arc::new(FailingNotifier));

        let err = engine.reserve_seat("f9", "s1", "p1").await.unwrap_err();
        assert!(matches!(err, ReservationError::FlightNotFound(id) if id == "f9"));

        let err = engine.reserve_seat("f2", "s9", "p1").await.unwrap_err();
        assert!(matches!(err, ReservationError::SeatNotFound { seat_id, .. } if seat_id == "s9"));
    }

    #[tokio::test]
    async fn test_invalid_passenger_rejected_before_read() {
        let engine = ReservationEngine::new(Arc::new(MemoryFlightStore::new()), Arc::new(FailingNotifier));

        let err = engine.reserve_seat("f2", "s1", "  ").await.unwrap_err();
        assert!(matches!(err, ReservationError::InvalidPassenger(_)));

        let err = engine.reserve_seat("f2", "s1", "-").await.unwrap_err();
        assert!(matches!(err, ReservationError::InvalidPassenger(_)));
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_reservation() {
        let store = seeded_store().await;
        let engine = ReservationEngine::new(store.clone(), Arc::new(FailingNotifier));

        let reservation = engine.reserve_seat("f2", "s2", "p7").await.unwrap();
        assert_eq!(reservation.seat_id, "s2");

        let stored = store.find("f2").await.unwrap();
        assert_eq!(stored.seats[1].passenger_id.as_deref(), Some("p7"));
    }

    #[tokio::test]
    async fn test_full_flight_flag_fails_fast() {
        let store = Arc::new(MemoryFlightStore::new());
        let mut flight = Flight::new("f3", "2019-11-26T09:05:00+0000", vec![Seat::new("s1", "A", 1)]);
        flight.has_free_seats = false;
        store.save(&flight).await.unwrap();
        let engine = ReservationEngine::new(store, Arc::new(FailingNotifier));

        let err = engine.reserve_seat("f3", "s1", "p1").await.unwrap_err();
        assert!(matches!(err, ReservationError::SeatNotAvailable { .. }));
    }

    #[test]
    fn test_locate_seat_counts_open_seats() {
        let mut flight = Flight::new(
            "f1",
            "2019-11-26T09:05:00+0000",
            vec![Seat::new("s1", "A", 1), Seat::new("s2", "B", 1), Seat::new("s2", "C", 1)],
        );
        flight.seats[0].passenger_id = Some("p1".to_string());

        assert_eq!(locate_seat(&flight, "s2"), Some((1, 2)));
        assert_eq!(locate_seat(&flight, "s1"), Some((0, 2)));
        assert_eq!(locate_seat(&flight, "s4"), None);
    }
}
