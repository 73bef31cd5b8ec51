use async_trait::async_trait;
use crate::model::Flight;
use crate::StoreResult;

/// A single conditional seat assignment, addressed both by position and id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatClaim {
    pub flight_id: String,
    pub seat_index: usize,
    pub seat_id: String,
    pub passenger_id: String,
}

/// Result of a conditional write that reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Passenger written; `flight_full` is the availability flag the write stored, inverted.
    Claimed { flight_full: bool },
    /// Precondition no longer held when the store evaluated it; nothing was written.
    Rejected,
}

/// Flight record store plus its availability index.
///
/// Implementations must apply `claim_seat` atomically: the precondition
/// (flight still has free seats, the seat at `seat_index` still has
/// `seat_id` and no passenger) is evaluated by the store right before the
/// mutation, and the passenger plus the recomputed `has_free_seats` flag are
/// written together. The availability index must never observe one without
/// the other.
#[async_trait]
pub trait FlightStore: Send + Sync {
    /// Full-record upsert by id. Seeding only; never part of the reservation path.
    async fn save(&self, flight: &Flight) -> StoreResult<Flight>;

    async fn find(&self, id: &str) -> StoreResult<Flight>;

    /// Flights with free seats departing within `[from, to]`, by departure.
    /// Fails with `NoFlightsFound` rather than returning an empty list.
    async fn list_by_departure(&self, from: &str, to: &str) -> StoreResult<Vec<Flight>>;

    async fn claim_seat(&self, claim: &SeatClaim) -> StoreResult<ClaimOutcome>;
}
