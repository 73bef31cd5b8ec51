use std::collections::{BTreeSet, HashMap};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::model::Flight;
use crate::store::{ClaimOutcome, FlightStore, SeatClaim};
use crate::{StoreError, StoreResult};

/// In-process flight store (development server and tests).
///
/// The availability index is an ordered set of `(departure, id)` for flights
/// whose flag is set. Records and index live behind one lock, so every write
/// updates both before any reader can look.
#[derive(Default)]
pub struct MemoryFlightStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    flights: HashMap<String, Flight>,
    available: BTreeSet<(String, String)>,
}

impl Tables {
    fn index(&mut self, flight: &Flight) {
        let key = (flight.departure.clone(), flight.id.clone());
        if flight.has_free_seats {
            self.available.insert(key);
        } else {
            self.available.remove(&key);
        }
    }

    fn unindex(&mut self, flight: &Flight) {
        self.available.remove(&(flight.departure.clone(), flight.id.clone()));
    }
}

impl MemoryFlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.flights.len()
    }
}

/// Evaluate the claim precondition against `flight` and apply it in place.
fn apply_claim(flight: &mut Flight, claim: &SeatClaim) -> ClaimOutcome {
    if !flight.has_free_seats {
        return ClaimOutcome::Rejected;
    }

    let Some(seat) = flight.seats.get_mut(claim.seat_index) else {
        return ClaimOutcome::Rejected;
    };
    if seat.id != claim.seat_id || !seat.is_free() {
        return ClaimOutcome::Rejected;
    }

    seat.passenger_id = Some(claim.passenger_id.clone());
    flight.has_free_seats = flight.open_seats() > 0;

    ClaimOutcome::Claimed {
        flight_full: !flight.has_free_seats,
    }
}

#[async_trait]
impl FlightStore for MemoryFlightStore {
    async fn save(&self, flight: &Flight) -> StoreResult<Flight> {
        let mut tables = self.tables.write().await;

        if let Some(previous) = tables.flights.remove(&flight.id) {
            tables.unindex(&previous);
        }
        tables.index(flight);
        tables.flights.insert(flight.id.clone(), flight.clone());

        Ok(flight.clone())
    }

    async fn find(&self, id: &str) -> StoreResult<Flight> {
        self.tables
            .read()
            .await
            .flights
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::FlightNotFound(id.to_string()))
    }

    async fn list_by_departure(&self, from: &str, to: &str) -> StoreResult<Vec<Flight>> {
        let tables = self.tables.read().await;

        let flights: Vec<Flight> = tables
            .available
            .range((from.to_string(), String::new())..)
            .take_while(|(departure, _)| departure.as_str() <= to)
            .filter_map(|(_, id)| tables.flights.get(id).cloned())
            .collect();

        if flights.is_empty() {
            return Err(StoreError::NoFlightsFound {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        Ok(flights)
    }

    async fn claim_seat(&self, claim: &SeatClaim) -> StoreResult<ClaimOutcome> {
        let mut tables = self.tables.write().await;

        let flight = tables
            .flights
            .get_mut(&claim.flight_id)
            .ok_or_else(|| StoreError::FlightNotFound(claim.flight_id.clone()))?;

        let outcome = apply_claim(flight, claim);
        if let ClaimOutcome::Claimed { flight_full: true } = outcome {
            let closed = flight.clone();
            tables.index(&closed);
            debug!("Flight {} removed from availability index", claim.flight_id);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Seat;

    fn flight(id: &str, departure: &str) -> Flight {
        Flight::new(id, departure, vec![Seat::new("s1", "A", 1), Seat::new("s2", "A", 1)])
    }

    fn claim(flight_id: &str, seat_index: usize, seat_id: &str, passenger_id: &str) -> SeatClaim {
        SeatClaim {
            flight_id: flight_id.to_string(),
            seat_index,
            seat_id: seat_id.to_string(),
            passenger_id: passenger_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_and_find_round_trip() {
        let store = MemoryFlightStore::new();
        let mut saved = flight("f2", "2019-11-26T09:05:00+0000");
        // Saved as given, even when the flag disagrees with the seats.
        saved.has_free_seats = false;

        store.save(&saved).await.unwrap();
        store.save(&saved).await.unwrap();

        assert_eq!(store.find("f2").await.unwrap(), saved);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_unknown_flight() {
        let store = MemoryFlightStore::new();
        let err = store.find("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::FlightNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_list_by_departure_window_is_inclusive() {
        let store = MemoryFlightStore::new();
        store.save(&flight("f1", "2019-11-22T09:05:00+0000")).await.unwrap();
        store.save(&flight("f2", "2019-11-24T09:05:00+0000")).await.unwrap();
        store.save(&flight("f3", "2019-11-26T09:05:00+0000")).await.unwrap();

        let found = store
            .list_by_departure("2019-11-22T09:05:00+0000", "2019-11-24T09:05:00+0000")
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2"]);
    }

    #[tokio::test]
    async fn test_list_by_departure_skips_full_flights() {
        let store = MemoryFlightStore::new();
        let mut full = flight("f1", "2019-11-22T09:05:00+0000");
        full.has_free_seats = false;
        store.save(&full).await.unwrap();

        let err = store
            .list_by_departure("2019-11-21T00:00:00+0000", "2019-11-25T00:00:00+0000")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoFlightsFound { .. }));
    }

    #[tokio::test]
    async fn test_resave_moves_index_entry() {
        let store = MemoryFlightStore::new();
        store.save(&flight("f1", "2019-11-22T09:05:00+0000")).await.unwrap();
        store.save(&flight("f1", "2019-12-01T09:05:00+0000")).await.unwrap();

        assert!(store
            .list_by_departure("2019-11-21T00:00:00+0000", "2019-11-25T00:00:00+0000")
            .await
            .is_err());
        assert_eq!(
            store
                .list_by_departure("2019-11-30T00:00:00+0000", "2019-12-02T00:00:00+0000")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_claim_last_seat_closes_flight_and_index() {
        let store = MemoryFlightStore::new();
        store.save(&flight("f1", "2019-11-22T09:05:00+0000")).await.unwrap();

        let first = store.claim_seat(&claim("f1", 0, "s1", "p1")).await.unwrap();
        assert_eq!(first, ClaimOutcome::Claimed { flight_full: false });

        let second = store.claim_seat(&claim("f1", 1, "s2", "p2")).await.unwrap();
        assert_eq!(second, ClaimOutcome::Claimed { flight_full: true });

        let stored = store.find("f1").await.unwrap();
        assert!(!stored.has_free_seats);
        assert!(stored.is_consistent());
        assert!(store
            .list_by_departure("2019-11-21T00:00:00+0000", "2019-11-25T00:00:00+0000")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_claim_rejected_when_seat_taken_or_moved() {
        let store = MemoryFlightStore::new();
        store.save(&flight("f1", "2019-11-22T09:05:00+0000")).await.unwrap();
        store.claim_seat(&claim("f1", 0, "s1", "p1")).await.unwrap();

        let taken = store.claim_seat(&claim("f1", 0, "s1", "p2")).await.unwrap();
        assert_eq!(taken, ClaimOutcome::Rejected);

        let wrong_position = store.claim_seat(&claim("f1", 0, "s2", "p2")).await.unwrap();
        assert_eq!(wrong_position, ClaimOutcome::Rejected);

        let out_of_range = store.claim_seat(&claim("f1", 7, "s2", "p2")).await.unwrap();
        assert_eq!(out_of_range, ClaimOutcome::Rejected);

        let stored = store.find("f1").await.unwrap();
        assert_eq!(stored.seats[0].passenger_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_claim_rejected_when_flight_flag_cleared() {
        let store = MemoryFlightStore::new();
        let mut closed = flight("f1", "2019-11-22T09:05:00+0000");
        closed.has_free_seats = false;
        store.save(&closed).await.unwrap();

        let outcome = store.claim_seat(&claim("f1", 0, "s1", "p1")).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Rejected);
    }
}
