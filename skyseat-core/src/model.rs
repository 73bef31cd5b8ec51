use serde::{Deserialize, Serialize};

/// Placeholder the durable backends persist for a seat nobody holds yet.
/// Translated back to `None` on read, so it can never be a real passenger id.
pub const UNASSIGNED_PASSENGER: &str = "-";

/// A flight and the seats it owns.
///
/// `departure` is kept as the sortable string it is stored as (ISO-8601 with a
/// fixed offset); range queries compare it lexicographically.
/// `has_free_seats` is denormalized from `seats` so the availability index can
/// filter on it; only the atomic seat claim ever changes it after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    pub departure: String,
    pub has_free_seats: bool,
    pub seats: Vec<Seat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: String,
    pub letter: String,
    pub row: i32,
    #[serde(default)]
    pub passenger_id: Option<String>,
}

impl Flight {
    /// New flight with the availability flag derived from its seats.
    pub fn new(id: impl Into<String>, departure: impl Into<String>, seats: Vec<Seat>) -> Self {
        let mut flight = Self {
            id: id.into(),
            departure: departure.into(),
            has_free_seats: false,
            seats,
        };
        flight.has_free_seats = flight.open_seats() > 0;
        flight
    }

    /// First seat carrying `seat_id`, with its position in the seat list.
    pub fn seat(&self, seat_id: &str) -> Option<(usize, &Seat)> {
        self.seats.iter().enumerate().find(|(_, s)| s.id == seat_id)
    }

    pub fn open_seats(&self) -> usize {
        self.seats.iter().filter(|s| s.is_free()).count()
    }

    /// Whether the stored flag agrees with the seat list.
    pub fn is_consistent(&self) -> bool {
        self.has_free_seats == (self.open_seats() > 0)
    }
}

impl Seat {
    pub fn new(id: impl Into<String>, letter: impl Into<String>, row: i32) -> Self {
        Self {
            id: id.into(),
            letter: letter.into(),
            row,
            passenger_id: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.passenger_id.as_deref().map_or(true, str::is_empty)
    }
}

/// Passenger ids must be non-blank and distinguishable from the stored placeholder.
pub fn is_valid_passenger_id(passenger_id: &str) -> bool {
    let trimmed = passenger_id.trim();
    !trimmed.is_empty() && trimmed != UNASSIGNED_PASSENGER
}
