//! Loyalty account handlers

use axum::{extract::State, Json};

use crate::extract::UserContext;
use crate::AppState;
use seatwise_common::booking::LoyaltySummary;
use seatwise_common::errors::Result;

/// The caller's point balance and redemption headroom
pub async fn get_loyalty(
    State(state): State<AppState>,
    user: UserContext,
) -> Result<Json<LoyaltySummary>> {
    let summary = state.workflow.loyalty_summary(user.user_id).await?;

    Ok(Json(summary))
}
