//! Loyalty point accrual and redemption

use crate::booking::{POINTS_PER_CURRENCY_UNIT, POINTS_PER_REDEMPTION_UNIT};
use crate::errors::{AppError, Result};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A user's loyalty standing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltySummary {
    pub user_id: Uuid,
    pub points_balance: i64,
    pub total_earned: i64,
    pub total_redeemed: i64,
    /// Largest point amount currently redeemable (balance rounded down to
    /// the nearest redemption unit)
    pub max_redeemable: i64,
}

/// Point ledger over a [`Store`]; accounts are created lazily on first use
pub struct LoyaltyLedger<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for LoyaltyLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> LoyaltyLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Credit points for a purchase: floor(amount x earn rate).
    /// Returns the number of points credited.
    pub async fn earn(&self, user_id: Uuid, amount: f64) -> Result<i64> {
        let points = (amount * POINTS_PER_CURRENCY_UNIT as f64).floor() as i64;
        if points > 0 {
            self.store.credit_points(user_id, points).await?;
            crate::metrics::record_points(points, 0);
            tracing::debug!(user_id = %user_id, points, "Points earned");
        }
        Ok(points)
    }

    /// Debit exactly `points` from the user's balance.
    ///
    /// The debit is a compare-and-swap against the stored balance; a
    /// concurrent redemption that drains the account surfaces here as
    /// InsufficientBalance, never as a negative balance.
    pub async fn redeem(&self, user_id: Uuid, points: i64) -> Result<()> {
        if points <= 0 {
            return Err(AppError::Validation {
                message: "points to redeem must be positive".to_string(),
                field: Some("points_to_redeem".to_string()),
            });
        }

        if !self.store.debit_points(user_id, points).await? {
            let account = self.store.loyalty_account(user_id).await?;
            return Err(AppError::InsufficientBalance {
                requested: points,
                balance: account.points_balance,
            });
        }

        crate::metrics::record_points(0, points);
        tracing::debug!(user_id = %user_id, points, "Points redeemed");
        Ok(())
    }

    /// Compensation for a failed booking: put debited points back.
    ///
    /// Reverses the debit rather than crediting fresh points, so
    /// total_earned and total_redeemed keep describing only bookings that
    /// actually went through.
    pub async fn refund(&self, user_id: Uuid, points: i64) -> Result<()> {
        if points > 0 {
            self.store.refund_points(user_id, points).await?;
            tracing::debug!(user_id = %user_id, points, "Points refunded");
        }
        Ok(())
    }

    /// Current standing of the user's account (created lazily)
    pub async fn summary(&self, user_id: Uuid) -> Result<LoyaltySummary> {
        let account = self.store.loyalty_account(user_id).await?;
        let max_redeemable =
            account.points_balance / POINTS_PER_REDEMPTION_UNIT * POINTS_PER_REDEMPTION_UNIT;

        Ok(LoyaltySummary {
            user_id,
            points_balance: account.points_balance,
            total_earned: account.total_earned,
            total_redeemed: account.total_redeemed,
            max_redeemable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_earn_floors_fractional_amounts() {
        let store = Arc::new(MemoryStore::new());
        let ledger = LoyaltyLedger::new(Arc::clone(&store));
        let user = Uuid::new_v4();

        assert_eq!(ledger.earn(user, 12.34).await.unwrap(), 123);
        assert_eq!(ledger.earn(user, 0.05).await.unwrap(), 0);

        let summary = ledger.summary(user).await.unwrap();
        assert_eq!(summary.points_balance, 123);
        assert_eq!(summary.total_earned, 123);
    }

    #[tokio::test]
    async fn test_redeem_is_all_or_nothing() {
        let store = Arc::new(MemoryStore::new());
        let ledger = LoyaltyLedger::new(Arc::clone(&store));
        let user = Uuid::new_v4();

        store.credit_points(user, 150).await.unwrap();

        let err = ledger.redeem(user, 200).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientBalance { requested: 200, balance: 150 }
        ));
        // Failed redemption left the balance untouched
        assert_eq!(ledger.summary(user).await.unwrap().points_balance, 150);

        ledger.redeem(user, 150).await.unwrap();
        let summary = ledger.summary(user).await.unwrap();
        assert_eq!(summary.points_balance, 0);
        assert_eq!(summary.total_redeemed, 150);
    }

    #[tokio::test]
    async fn test_refund_reverses_the_debit_in_lifetime_totals() {
        let store = Arc::new(MemoryStore::new());
        let ledger = LoyaltyLedger::new(Arc::clone(&store));
        let user = Uuid::new_v4();

        store.credit_points(user, 300).await.unwrap();
        ledger.redeem(user, 200).await.unwrap();
        ledger.refund(user, 200).await.unwrap();

        let summary = ledger.summary(user).await.unwrap();
        assert_eq!(summary.points_balance, 300);
        // An aborted redemption leaves no mark on either lifetime total
        assert_eq!(summary.total_earned, 300);
        assert_eq!(summary.total_redeemed, 0);
    }

    #[tokio::test]
    async fn test_max_redeemable_rounds_down() {
        let store = Arc::new(MemoryStore::new());
        let ledger = LoyaltyLedger::new(Arc::clone(&store));
        let user = Uuid::new_v4();

        store.credit_points(user, 257).await.unwrap();
        assert_eq!(ledger.summary(user).await.unwrap().max_redeemable, 200);

        let fresh = Uuid::new_v4();
        assert_eq!(ledger.summary(fresh).await.unwrap().max_redeemable, 0);
    }
}
