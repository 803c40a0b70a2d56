//! Booking lifecycle handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::extract::UserContext;
use crate::AppState;
use seatwise_common::booking::CreateBooking;
use seatwise_common::errors::{AppError, Result};
use seatwise_common::store::BookingWithSeats;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub showtime_id: Uuid,

    #[validate(length(min = 1, max = 20))]
    pub seat_ids: Vec<Uuid>,

    #[serde(default)]
    pub discount_code: Option<String>,

    #[serde(default)]
    pub points_to_redeem: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSeatsRequest {
    #[validate(length(min = 1, max = 20))]
    pub seat_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub showtime_id: Uuid,
    pub status: String,
    pub total_seats: i32,
    pub total_amount: f64,
    pub seat_ids: Vec<Uuid>,
    pub created_at: String,
}

impl From<BookingWithSeats> for BookingResponse {
    fn from(row: BookingWithSeats) -> Self {
        Self {
            id: row.booking.id,
            showtime_id: row.booking.showtime_id,
            status: row.booking.status,
            total_seats: row.booking.total_seats,
            total_amount: row.booking.total_amount,
            seat_ids: row.seat_ids,
            created_at: row.booking.created_at.to_rfc3339(),
        }
    }
}

/// Create a booking
pub async fn create_booking(
    State(state): State<AppState>,
    user: UserContext,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let created = state
        .workflow
        .create(CreateBooking {
            user_id: user.user_id,
            showtime_id: request.showtime_id,
            seat_ids: request.seat_ids,
            discount_code: request.discount_code,
            points_to_redeem: request.points_to_redeem,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// List the caller's bookings, newest first
pub async fn list_bookings(
    State(state): State<AppState>,
    user: UserContext,
) -> Result<Json<Vec<BookingResponse>>> {
    let bookings = state.workflow.bookings(user.user_id).await?;

    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

/// Fetch one booking; owner only
pub async fn get_booking(
    State(state): State<AppState>,
    user: UserContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>> {
    let booking = state.workflow.booking(user.user_id, booking_id).await?;

    Ok(Json(booking.into()))
}

/// Replace the booking's seat set
pub async fn update_booking_seats(
    State(state): State<AppState>,
    user: UserContext,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<UpdateSeatsRequest>,
) -> Result<Json<BookingResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let updated = state
        .workflow
        .update(user.user_id, booking_id, request.seat_ids)
        .await?;

    Ok(Json(updated.into()))
}

/// Cancel a booking. Idempotent; the booking row is kept.
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: UserContext,
    Path(booking_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.workflow.cancel(user.user_id, booking_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
