pub mod model;
pub mod store;
pub mod memory;
pub mod notify;
pub mod reservation;

pub use model::{Flight, Seat};
pub use store::{ClaimOutcome, FlightStore, SeatClaim};
pub use memory::MemoryFlightStore;
pub use notify::{BroadcastNotifier, ReservationNotifier, SeatReservedMessage};
pub use reservation::{Reservation, ReservationEngine};

/// Boxed transport error carried through from a storage or messaging backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Flight not found: {0}")]
    FlightNotFound(String),

    #[error("No flights with free seats departing between {from} and {to}")]
    NoFlightsFound {
        from: String,
        to: String,
    },

    #[error("Malformed flight record {id}: {reason}")]
    MalformedRecord {
        id: String,
        reason: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    pub fn backend(err: impl Into<BoxError>) -> Self {
        StoreError::Backend(err.into())
    }

    /// True for the "nothing there" kinds a caller usually reports as not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::FlightNotFound(_) | StoreError::NoFlightsFound { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Flight not found: {0}")]
    FlightNotFound(String),

    #[error("Seat {seat_id} not found in flight {flight_id}")]
    SeatNotFound {
        flight_id: String,
        seat_id: String,
    },

    #[error("Seat {seat_id} on flight {flight_id} is not available")]
    SeatNotAvailable {
        flight_id: String,
        seat_id: String,
    },

    #[error("Invalid passenger id: {0:?}")]
    InvalidPassenger(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::FlightNotFound(id) => ReservationError::FlightNotFound(id),
            other => ReservationError::Store(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No subscribers for reservation notifications")]
    NoSubscribers,

    #[error("Failed to publish notification: {0}")]
    Publish(#[source] BoxError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type ReservationResult<T> = Result<T, ReservationError>;
