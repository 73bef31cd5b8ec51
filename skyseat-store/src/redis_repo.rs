use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use skyseat_core::model::UNASSIGNED_PASSENGER;
use skyseat_core::{ClaimOutcome, Flight, FlightStore, SeatClaim, StoreError, StoreResult};
use tracing::{debug, info};

use crate::record::{decode_flight, StoredFlight};

/// Sorted set holding one `departure\0id` member per flight with free seats.
/// All scores are 0, so members order lexicographically by departure.
pub const AVAILABILITY_INDEX_KEY: &str = "flights:by_has_free_seats_and_departure";

// Replace the record and move its index entry in one step.
const SAVE_SCRIPT: &str = r#"
    local previous = redis.call("GET", KEYS[1])
    if previous then
        local old = cjson.decode(previous)
        redis.call("ZREM", KEYS[2], old.departure .. "\0" .. old.id)
    end
    redis.call("SET", KEYS[1], ARGV[1])
    if ARGV[3] == "1" then
        redis.call("ZADD", KEYS[2], 0, ARGV[2])
    end
    return 1
"#;

// -1: no such flight, -2: precondition failed, otherwise seats still open.
const CLAIM_SCRIPT: &str = r#"
    local raw = redis.call("GET", KEYS[1])
    if not raw then
        return -1
    end
    local flight = cjson.decode(raw)
    if flight.has_free_seats ~= 1 then
        return -2
    end
    local seat = flight.seats[tonumber(ARGV[1])]
    if seat == nil or seat.id ~= ARGV[2] or seat.passenger_id ~= ARGV[4] then
        return -2
    end
    seat.passenger_id = ARGV[3]
    local open = 0
    for _, s in ipairs(flight.seats) do
        if s.passenger_id == ARGV[4] then
            open = open + 1
        end
    end
    if open == 0 then
        flight.has_free_seats = 0
        redis.call("ZREM", KEYS[2], flight.departure .. "\0" .. flight.id)
    end
    redis.call("SET", KEYS[1], cjson.encode(flight))
    return open
"#;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn connection(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

pub fn flight_key(id: &str) -> String {
    format!("flight:{}", id)
}

pub fn index_member(departure: &str, id: &str) -> String {
    format!("{}\0{}", departure, id)
}

/// `ZRANGEBYLEX` bounds covering every member whose departure is in `[from, to]`.
pub fn departure_bounds(from: &str, to: &str) -> (String, String) {
    (format!("[{}", from), format!("({}\u{1}", to))
}

fn member_id(member: &str) -> Option<&str> {
    member.split_once('\0').map(|(_, id)| id)
}

fn still_open(flights: Vec<Flight>) -> Vec<Flight> {
    flights.into_iter().filter(|f| f.has_free_seats).collect()
}

/// Flight records as JSON strings plus a lex-ordered availability index.
/// Both writes go through Lua scripts so the index never drifts from the record.
pub struct RedisFlightStore {
    redis: RedisClient,
    save_script: redis::Script,
    claim_script: redis::Script,
}

impl RedisFlightStore {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            redis,
            save_script: redis::Script::new(SAVE_SCRIPT),
            claim_script: redis::Script::new(CLAIM_SCRIPT),
        }
    }

    async fn connection(&self) -> StoreResult<MultiplexedConnection> {
        self.redis.connection().await.map_err(StoreError::backend)
    }
}

#[async_trait]
impl FlightStore for RedisFlightStore {
    async fn save(&self, flight: &Flight) -> StoreResult<Flight> {
        let mut conn = self.connection().await?;
        let record = StoredFlight::from(flight);
        let payload = serde_json::to_string(&record).map_err(StoreError::backend)?;

        let _: i64 = self
            .save_script
            .key(flight_key(&flight.id))
            .key(AVAILABILITY_INDEX_KEY)
            .arg(payload)
            .arg(index_member(&flight.departure, &flight.id))
            .arg(record.has_free_seats.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        info!("Flight {} saved", flight.id);
        Ok(flight.clone())
    }

    async fn find(&self, id: &str) -> StoreResult<Flight> {
        let mut conn = self.connection().await?;

        let raw: Option<String> = redis::cmd("GET")
            .arg(flight_key(id))
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        match raw {
            Some(raw) => decode_flight(id, &raw),
            None => Err(StoreError::FlightNotFound(id.to_string())),
        }
    }

    async fn list_by_departure(&self, from: &str, to: &str) -> StoreResult<Vec<Flight>> {
        let mut conn = self.connection().await?;
        let (min, max) = departure_bounds(from, to);

        let members: Vec<String> = redis::cmd("ZRANGEBYLEX")
            .arg(AVAILABILITY_INDEX_KEY)
            .arg(min)
            .arg(max)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        let ids: Vec<&str> = members.iter().filter_map(|m| member_id(m)).collect();
        if ids.is_empty() {
            return Err(StoreError::NoFlightsFound {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let keys: Vec<String> = ids.iter().map(|id| flight_key(id)).collect();
        let records: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        let flights = ids
            .iter()
            .zip(records)
            .filter_map(|(id, raw)| raw.map(|raw| decode_flight(id, &raw)))
            .collect::<StoreResult<Vec<Flight>>>()?;
        // A claim may fill a flight between the range read and the fetch.
        let flights = still_open(flights);

        if flights.is_empty() {
            return Err(StoreError::NoFlightsFound {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        Ok(flights)
    }

    async fn claim_seat(&self, claim: &SeatClaim) -> StoreResult<ClaimOutcome> {
        let mut conn = self.connection().await?;

        let open: i64 = self
            .claim_script
            .key(flight_key(&claim.flight_id))
            .key(AVAILABILITY_INDEX_KEY)
            // Lua lists are 1-based.
            .arg(claim.seat_index + 1)
            .arg(&claim.seat_id)
            .arg(&claim.passenger_id)
            .arg(UNASSIGNED_PASSENGER)
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        match open {
            -1 => Err(StoreError::FlightNotFound(claim.flight_id.clone())),
            -2 => {
                debug!("Conditional claim on flight {} rejected", claim.flight_id);
                Ok(ClaimOutcome::Rejected)
            }
            open => Ok(ClaimOutcome::Claimed {
                flight_full: open == 0,
            }),
        }
    }
}
