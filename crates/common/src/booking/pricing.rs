//! Price quotes
//!
//! A quote is pure arithmetic over a snapshot of store state: base price,
//! an optional code discount, an optional points discount. Both discounts
//! are computed against the original base and summed; the final amount is
//! clamped at zero. Quoting never mutates anything, so the same inputs
//! always produce the same breakdown.

use crate::booking::{MAX_SEATS_PER_BOOKING, POINTS_PER_REDEMPTION_UNIT};
use crate::db::models::{DiscountCode, Showtime};
use crate::errors::{AppError, Result};
use crate::store::Store;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Itemized result of a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Showtime price times seat count
    pub base: f64,
    /// Discount granted by the code, against the base
    pub code_discount: f64,
    /// Discount granted by point redemption, against the base
    pub points_discount: f64,
    /// Points that redemption will debit (0 when below the redemption unit)
    pub points_redeemed: i64,
    /// Amount payable, clamped at zero
    #[serde(rename = "final")]
    pub final_amount: f64,
}

/// Computes deterministic quotes from showtime price, discount codes and
/// loyalty balances
pub struct PricingEngine<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for PricingEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> PricingEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Quote the price for `seat_count` seats of a showtime.
    ///
    /// Fails with a Validation error when the discount code is unknown,
    /// inactive, outside its validity window, at its usage limit, or the
    /// base is below its minimum purchase. Redeeming more points than the
    /// caller's balance is an InsufficientBalance error; redeeming fewer
    /// than one redemption unit is a no-op zero discount.
    pub async fn quote(
        &self,
        user_id: Uuid,
        showtime: &Showtime,
        seat_count: usize,
        discount_code: Option<&str>,
        points_to_redeem: Option<i64>,
    ) -> Result<PriceBreakdown> {
        if seat_count == 0 {
            return Err(AppError::Validation {
                message: "a booking needs at least one seat".to_string(),
                field: Some("seat_count".to_string()),
            });
        }
        if seat_count > MAX_SEATS_PER_BOOKING {
            return Err(AppError::Validation {
                message: format!("a booking may claim at most {} seats", MAX_SEATS_PER_BOOKING),
                field: Some("seat_count".to_string()),
            });
        }

        let base = showtime.price * seat_count as f64;

        let code_discount = match discount_code {
            Some(code) => {
                let row = self
                    .store
                    .find_discount_code(code)
                    .await?
                    .ok_or_else(|| invalid_code(code, "unknown code"))?;
                applicable_discount(&row, base)?
            }
            None => 0.0,
        };

        let (points_discount, points_redeemed) = match points_to_redeem {
            Some(points) if points > 0 => {
                let account = self.store.loyalty_account(user_id).await?;
                if points > account.points_balance {
                    return Err(AppError::InsufficientBalance {
                        requested: points,
                        balance: account.points_balance,
                    });
                }
                let units = points / POINTS_PER_REDEMPTION_UNIT;
                if units == 0 {
                    // Below one redemption unit: nothing to redeem
                    (0.0, 0)
                } else {
                    (units as f64, points)
                }
            }
            Some(points) if points < 0 => {
                return Err(AppError::Validation {
                    message: "points to redeem cannot be negative".to_string(),
                    field: Some("points_to_redeem".to_string()),
                });
            }
            _ => (0.0, 0),
        };

        let final_amount = (base - code_discount - points_discount).max(0.0);

        crate::metrics::record_quote(code_discount > 0.0, points_redeemed > 0);

        Ok(PriceBreakdown {
            base,
            code_discount,
            points_discount,
            points_redeemed,
            final_amount,
        })
    }
}

/// Discount a code grants against `base`, after all validity checks
fn applicable_discount(code: &DiscountCode, base: f64) -> Result<f64> {
    if !code.is_valid_at(Utc::now()) {
        return Err(invalid_code(&code.code, "code is not redeemable"));
    }
    if base < code.min_purchase_amount {
        return Err(invalid_code(&code.code, "purchase is below the code's minimum"));
    }
    Ok(code.discount_for(base))
}

fn invalid_code(code: &str, reason: &str) -> AppError {
    AppError::Validation {
        message: format!("discount code {}: {}", code, reason),
        field: Some("discount_code".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DiscountType;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    fn percentage_code(code: &str, percent: f64) -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: Uuid::new_v4(),
            code: code.to_string(),
            description: None,
            discount_type: DiscountType::Percentage.into(),
            discount_value: percent,
            min_purchase_amount: 0.0,
            max_discount_amount: None,
            usage_limit: None,
            used_count: 0,
            valid_from: (now - Duration::days(1)).into(),
            valid_until: (now + Duration::days(1)).into(),
            is_active: true,
        }
    }

    async fn fixture(price: f64) -> (Arc<MemoryStore>, Showtime) {
        let store = Arc::new(MemoryStore::new());
        let movie = store.add_movie("Arrival", 116);
        let hall = Uuid::new_v4();
        let now = Utc::now();
        let showtime_id = store.add_showtime(movie, hall, now, now + Duration::hours(2), price);
        let showtime = store.find_showtime(showtime_id).await.unwrap().unwrap();
        (store, showtime)
    }

    #[tokio::test]
    async fn test_quote_is_deterministic() {
        let (store, showtime) = fixture(10.0).await;
        store.add_discount_code(percentage_code("TEN", 10.0));
        let user = Uuid::new_v4();
        store.credit_points(user, 500).await.unwrap();

        let engine = PricingEngine::new(Arc::clone(&store));
        let first = engine
            .quote(user, &showtime, 3, Some("TEN"), Some(500))
            .await
            .unwrap();
        let second = engine
            .quote(user, &showtime, 3, Some("TEN"), Some(500))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.base, 30.0);
        assert_eq!(first.code_discount, 3.0);
        // 500 points = 5 currency units, computed against the original base
        assert_eq!(first.points_discount, 5.0);
        assert_eq!(first.points_redeemed, 500);
        assert_eq!(first.final_amount, 22.0);
    }

    #[tokio::test]
    async fn test_small_point_redemption_is_noop() {
        let (store, showtime) = fixture(10.0).await;
        let user = Uuid::new_v4();
        store.credit_points(user, 99).await.unwrap();

        let engine = PricingEngine::new(Arc::clone(&store));
        let quote = engine
            .quote(user, &showtime, 1, None, Some(99))
            .await
            .unwrap();

        assert_eq!(quote.points_discount, 0.0);
        assert_eq!(quote.points_redeemed, 0);
        assert_eq!(quote.final_amount, 10.0);
    }

    #[tokio::test]
    async fn test_redeeming_over_balance_is_rejected() {
        let (store, showtime) = fixture(10.0).await;
        let user = Uuid::new_v4();
        store.credit_points(user, 100).await.unwrap();

        let engine = PricingEngine::new(Arc::clone(&store));
        let err = engine
            .quote(user, &showtime, 1, None, Some(200))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::InsufficientBalance { requested: 200, balance: 100 }
        ));
    }

    #[tokio::test]
    async fn test_exhausted_code_is_invalid() {
        let (store, showtime) = fixture(10.0).await;
        let mut code = percentage_code("ONCE", 10.0);
        code.usage_limit = Some(1);
        code.used_count = 1;
        store.add_discount_code(code);

        let engine = PricingEngine::new(Arc::clone(&store));
        let err = engine
            .quote(Uuid::new_v4(), &showtime, 1, Some("ONCE"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_discounts_clamp_at_zero() {
        let (store, showtime) = fixture(1.0).await;
        let now = Utc::now();
        store.add_discount_code(DiscountCode {
            id: Uuid::new_v4(),
            code: "BIG".to_string(),
            description: None,
            discount_type: DiscountType::FixedAmount.into(),
            discount_value: 0.5,
            min_purchase_amount: 0.0,
            max_discount_amount: None,
            usage_limit: None,
            used_count: 0,
            valid_from: (now - Duration::days(1)).into(),
            valid_until: (now + Duration::days(1)).into(),
            is_active: true,
        });
        let user = Uuid::new_v4();
        store.credit_points(user, 100).await.unwrap();

        let engine = PricingEngine::new(Arc::clone(&store));
        let quote = engine
            .quote(user, &showtime, 1, Some("BIG"), Some(100))
            .await
            .unwrap();

        // 1.0 base, 0.5 code discount, 1.0 points discount: clamped
        assert_eq!(quote.final_amount, 0.0);
    }
}
