use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use skyseat_core::Flight;
use tracing::debug;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights/{date_from}/{date_to}", get(list_flights))
        .route("/v1/flights/{id}", get(get_flight))
}

/// Flights with open seats departing inside the (inclusive) window.
async fn list_flights(
    State(state): State<AppState>,
    Path((date_from, date_to)): Path<(String, String)>,
) -> Result<Json<Vec<Flight>>, AppError> {
    let flights = state.flights.list_by_departure(&date_from, &date_to).await?;
    debug!("{} flights with free seats between {} and {}", flights.len(), date_from, date_to);
    Ok(Json(flights))
}

async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Flight>, AppError> {
    Ok(Json(state.flights.find(&id).await?))
}
