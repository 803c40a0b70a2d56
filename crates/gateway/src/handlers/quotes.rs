//! Price quote handlers

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::extract::UserContext;
use crate::AppState;
use seatwise_common::booking::PriceBreakdown;
use seatwise_common::errors::{AppError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct QuoteRequest {
    pub showtime_id: Uuid,

    #[validate(range(min = 1, max = 20))]
    pub seat_count: usize,

    #[serde(default)]
    pub discount_code: Option<String>,

    #[serde(default)]
    pub points_to_redeem: Option<i64>,
}

/// Price a prospective booking. Read-only; nothing is reserved or debited.
pub async fn quote(
    State(state): State<AppState>,
    user: UserContext,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<PriceBreakdown>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let breakdown = state
        .workflow
        .quote(
            user.user_id,
            request.showtime_id,
            request.seat_count,
            request.discount_code.as_deref(),
            request.points_to_redeem,
        )
        .await?;

    Ok(Json(breakdown))
}
