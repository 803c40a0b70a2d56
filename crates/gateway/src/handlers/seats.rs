//! Seat availability handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use seatwise_common::errors::Result;

#[derive(Serialize)]
pub struct SeatResponse {
    pub id: Uuid,
    pub row: String,
    pub number: i32,
}

#[derive(Serialize)]
pub struct AvailableSeatsResponse {
    pub showtime_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hall: Option<String>,
    pub seats: Vec<SeatResponse>,
}

/// List the AVAILABLE seats for a showtime, ordered by row then number
pub async fn list_available_seats(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Json<AvailableSeatsResponse>> {
    let availability = state.workflow.list_available_seats(showtime_id).await?;

    Ok(Json(AvailableSeatsResponse {
        showtime_id,
        hall: availability.hall.map(|hall| hall.name),
        seats: availability
            .seats
            .into_iter()
            .map(|seat| SeatResponse {
                id: seat.id,
                row: seat.row,
                number: seat.number,
            })
            .collect(),
    }))
}
