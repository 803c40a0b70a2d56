//! Discount code handlers

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::extract::UserContext;
use crate::AppState;
use seatwise_common::db::models::{DiscountCode, DiscountType};
use seatwise_common::errors::{AppError, Result};
use seatwise_common::store::{NewDiscountCode, Store};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDiscountCodeRequest {
    #[validate(length(min = 3, max = 32))]
    pub code: String,

    #[serde(default)]
    pub description: Option<String>,

    pub discount_type: DiscountType,

    #[validate(range(min = 0.01))]
    pub discount_value: f64,

    #[serde(default)]
    pub min_purchase_amount: f64,

    #[serde(default)]
    pub max_discount_amount: Option<f64>,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub usage_limit: Option<i32>,

    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct DiscountCodeResponse {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_value: f64,
    pub min_purchase_amount: f64,
    pub max_discount_amount: Option<f64>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from: String,
    pub valid_until: String,
    pub is_active: bool,
}

impl From<DiscountCode> for DiscountCodeResponse {
    fn from(row: DiscountCode) -> Self {
        Self {
            id: row.id,
            code: row.code,
            description: row.description,
            discount_type: row.discount_type,
            discount_value: row.discount_value,
            min_purchase_amount: row.min_purchase_amount,
            max_discount_amount: row.max_discount_amount,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            valid_from: row.valid_from.to_rfc3339(),
            valid_until: row.valid_until.to_rfc3339(),
            is_active: row.is_active,
        }
    }
}

/// Create a discount code
pub async fn create_discount_code(
    State(state): State<AppState>,
    user: UserContext,
    Json(request): Json<CreateDiscountCodeRequest>,
) -> Result<(StatusCode, Json<DiscountCodeResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    if request.valid_until <= request.valid_from {
        return Err(AppError::Validation {
            message: "valid_until must be after valid_from".to_string(),
            field: Some("valid_until".to_string()),
        });
    }

    if request.discount_type == DiscountType::Percentage && request.discount_value > 100.0 {
        return Err(AppError::Validation {
            message: "a percentage discount cannot exceed 100".to_string(),
            field: Some("discount_value".to_string()),
        });
    }

    let created = state
        .store
        .insert_discount_code(NewDiscountCode {
            code: request.code,
            description: request.description,
            discount_type: request.discount_type,
            discount_value: request.discount_value,
            min_purchase_amount: request.min_purchase_amount,
            max_discount_amount: request.max_discount_amount,
            usage_limit: request.usage_limit,
            valid_from: request.valid_from,
            valid_until: request.valid_until,
        })
        .await?;

    tracing::info!(
        code = %created.code,
        created_by = %user.user_id,
        "Discount code created"
    );

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// List active discount codes
pub async fn list_discount_codes(
    State(state): State<AppState>,
) -> Result<Json<Vec<DiscountCodeResponse>>> {
    let codes = state.store.active_discount_codes().await?;

    Ok(Json(codes.into_iter().map(Into::into).collect()))
}
