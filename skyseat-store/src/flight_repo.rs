use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use skyseat_core::model::UNASSIGNED_PASSENGER;
use skyseat_core::{ClaimOutcome, Flight, FlightStore, SeatClaim, StoreError, StoreResult};
use tracing::debug;

use crate::record::{StoredFlight, StoredSeat};

const SELECT_FLIGHT: &str =
    "SELECT id, departure, has_free_seats, seats FROM flights WHERE id = $1";

const SELECT_AVAILABLE: &str = r#"
    SELECT id, departure, has_free_seats, seats
    FROM flights
    WHERE has_free_seats = 1
      AND departure COLLATE "C" BETWEEN $1 AND $2
    ORDER BY departure COLLATE "C", id
"#;

const UPSERT_FLIGHT: &str = r#"
    INSERT INTO flights (id, departure, has_free_seats, seats)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (id) DO UPDATE
    SET departure = EXCLUDED.departure,
        has_free_seats = EXCLUDED.has_free_seats,
        seats = EXCLUDED.seats
"#;

// Every SET expression sees the pre-update row, so the EXISTS scan counts the
// other seats that are still open before this claim lands.
const CLAIM_SEAT: &str = r#"
    UPDATE flights
    SET seats = jsonb_set(seats, ARRAY[$2::int::text, 'passenger_id'], to_jsonb($4::text)),
        has_free_seats = CASE WHEN EXISTS (
            SELECT 1
            FROM jsonb_array_elements(seats) WITH ORDINALITY AS s(seat, pos)
            WHERE s.pos <> $2::int + 1
              AND s.seat ->> 'passenger_id' = $5
        ) THEN 1 ELSE 0 END
    WHERE id = $1
      AND has_free_seats = 1
      AND seats -> $2::int ->> 'id' = $3
      AND seats -> $2::int ->> 'passenger_id' = $5
    RETURNING has_free_seats
"#;

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: String,
    departure: String,
    has_free_seats: i16,
    seats: Json<Vec<StoredSeat>>,
}

impl TryFrom<FlightRow> for Flight {
    type Error = StoreError;

    fn try_from(row: FlightRow) -> Result<Self, Self::Error> {
        let has_free_seats = u8::try_from(row.has_free_seats).map_err(|_| StoreError::MalformedRecord {
            id: row.id.clone(),
            reason: format!("has_free_seats out of range: {}", row.has_free_seats),
        })?;

        Flight::try_from(StoredFlight {
            id: row.id,
            departure: row.departure,
            has_free_seats,
            seats: row.seats.0,
        })
    }
}

/// Flights table in PostgreSQL; the availability index is the composite
/// `(has_free_seats, departure)` index on the same row.
pub struct PostgresFlightStore {
    pub pool: PgPool,
}

impl PostgresFlightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlightStore for PostgresFlightStore {
    async fn save(&self, flight: &Flight) -> StoreResult<Flight> {
        let record = StoredFlight::from(flight);

        sqlx::query(UPSERT_FLIGHT)
            .bind(&record.id)
            .bind(&record.departure)
            .bind(i16::from(record.has_free_seats))
            .bind(Json(&record.seats))
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(flight.clone())
    }

    async fn find(&self, id: &str) -> StoreResult<Flight> {
        let row = sqlx::query_as::<_, FlightRow>(SELECT_FLIGHT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let Some(row) = row else {
            return Err(StoreError::FlightNotFound(id.to_string()));
        };

        Flight::try_from(row)
    }

    async fn list_by_departure(&self, from: &str, to: &str) -> StoreResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(SELECT_AVAILABLE)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        if rows.is_empty() {
            return Err(StoreError::NoFlightsFound {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        rows.into_iter().map(Flight::try_from).collect()
    }

    async fn claim_seat(&self, claim: &SeatClaim) -> StoreResult<ClaimOutcome> {
        let seat_index = i32::try_from(claim.seat_index).map_err(|_| StoreError::MalformedRecord {
            id: claim.flight_id.clone(),
            reason: format!("seat position {} out of range", claim.seat_index),
        })?;

        let updated: Option<(i16,)> = sqlx::query_as(CLAIM_SEAT)
            .bind(&claim.flight_id)
            .bind(seat_index)
            .bind(&claim.seat_id)
            .bind(&claim.passenger_id)
            .bind(UNASSIGNED_PASSENGER)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        match updated {
            Some((has_free_seats,)) => Ok(ClaimOutcome::Claimed {
                flight_full: has_free_seats == 0,
            }),
            None => {
                let (exists,): (bool,) =
                    sqlx::query_as("SELECT EXISTS(SELECT 1 FROM flights WHERE id = $1)")
                        .bind(&claim.flight_id)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(StoreError::backend)?;

                if !exists {
                    return Err(StoreError::FlightNotFound(claim.flight_id.clone()));
                }
                debug!("Conditional claim on flight {} rejected", claim.flight_id);
                Ok(ClaimOutcome::Rejected)
            }
        }
    }
}
