use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use skyseat_core::Reservation;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ReserveSeatRequest {
    #[serde(default)]
    pub flight_id: String,
    #[serde(default)]
    pub seat_id: String,
    #[serde(default)]
    pub passenger_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/reservations", post(reserve_seat))
}

async fn reserve_seat(
    State(state): State<AppState>,
    payload: Result<Json<ReserveSeatRequest>, JsonRejection>,
) -> Result<Json<Reservation>, AppError> {
    let Json(req) = payload.map_err(|rejection| AppError::ValidationError(rejection.body_text()))?;

    let flight_id = req.flight_id.trim();
    let seat_id = req.seat_id.trim();
    let passenger_id = req.passenger_id.trim();

    if flight_id.is_empty() || seat_id.is_empty() || passenger_id.is_empty() {
        return Err(AppError::ValidationError("missing required fields".to_string()));
    }

    let reservation = state
        .reservations
        .reserve_seat(flight_id, seat_id, passenger_id)
        .await?;

    Ok(Json(reservation))
}
