use serde::{Deserialize, Serialize};
use skyseat_core::model::UNASSIGNED_PASSENGER;
use skyseat_core::{Flight, Seat, StoreError};

/// Persisted shape of a flight: availability as 0/1, unassigned seats carry
/// the placeholder passenger instead of an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFlight {
    pub id: String,
    pub departure: String,
    pub has_free_seats: u8,
    pub seats: Vec<StoredSeat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSeat {
    pub id: String,
    pub letter: String,
    pub row: i32,
    pub passenger_id: String,
}

impl From<&Flight> for StoredFlight {
    fn from(flight: &Flight) -> Self {
        Self {
            id: flight.id.clone(),
            departure: flight.departure.clone(),
            has_free_seats: u8::from(flight.has_free_seats),
            seats: flight.seats.iter().map(StoredSeat::from).collect(),
        }
    }
}

impl From<&Seat> for StoredSeat {
    fn from(seat: &Seat) -> Self {
        let passenger_id = match seat.passenger_id.as_deref() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => UNASSIGNED_PASSENGER.to_string(),
        };

        Self {
            id: seat.id.clone(),
            letter: seat.letter.clone(),
            row: seat.row,
            passenger_id,
        }
    }
}

impl From<StoredSeat> for Seat {
    fn from(seat: StoredSeat) -> Self {
        let passenger_id = (seat.passenger_id != UNASSIGNED_PASSENGER && !seat.passenger_id.is_empty())
            .then_some(seat.passenger_id);

        Self {
            id: seat.id,
            letter: seat.letter,
            row: seat.row,
            passenger_id,
        }
    }
}

impl TryFrom<StoredFlight> for Flight {
    type Error = StoreError;

    fn try_from(record: StoredFlight) -> Result<Self, Self::Error> {
        let has_free_seats = match record.has_free_seats {
            0 => false,
            1 => true,
            other => {
                return Err(StoreError::MalformedRecord {
                    id: record.id,
                    reason: format!("has_free_seats must be 0 or 1, got {}", other),
                })
            }
        };

        Ok(Flight {
            id: record.id,
            departure: record.departure,
            has_free_seats,
            seats: record.seats.into_iter().map(Seat::from).collect(),
        })
    }
}

/// Decode a JSON-encoded record as kept by the key-value backend.
pub fn decode_flight(id: &str, raw: &str) -> Result<Flight, StoreError> {
    let record: StoredFlight = serde_json::from_str(raw).map_err(|e| StoreError::MalformedRecord {
        id: id.to_string(),
        reason: e.to_string(),
    })?;
    Flight::try_from(record)
}
