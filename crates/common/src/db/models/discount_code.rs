//! Discount code entity

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Discount type enum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

impl From<&str> for DiscountType {
    fn from(s: &str) -> Self {
        match s {
            "PERCENTAGE" => DiscountType::Percentage,
            "FIXED_AMOUNT" => DiscountType::FixedAmount,
            _ => DiscountType::FixedAmount,
        }
    }
}

impl From<DiscountType> for String {
    fn from(kind: DiscountType) -> Self {
        match kind {
            DiscountType::Percentage => "PERCENTAGE".to_string(),
            DiscountType::FixedAmount => "FIXED_AMOUNT".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discount_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub code: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub discount_type: String,

    #[sea_orm(column_type = "Double")]
    pub discount_value: f64,

    #[sea_orm(column_type = "Double")]
    pub min_purchase_amount: f64,

    #[sea_orm(column_type = "Double", nullable)]
    pub max_discount_amount: Option<f64>,

    pub usage_limit: Option<i32>,

    pub used_count: i32,

    pub valid_from: DateTimeWithTimeZone,

    pub valid_until: DateTimeWithTimeZone,

    pub is_active: bool,
}

impl Model {
    /// Get the discount type as an enum
    pub fn kind(&self) -> DiscountType {
        DiscountType::from(self.discount_type.as_str())
    }

    /// Check whether the code is redeemable at the given instant:
    /// active, within its validity window, and under its usage limit.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && now >= self.valid_from
            && now < self.valid_until
            && self.usage_limit.map_or(true, |limit| self.used_count < limit)
    }

    /// Discount this code grants against the given purchase amount.
    ///
    /// Capped by max_discount_amount (when set) and never exceeds the
    /// purchase amount itself. Validity and min-purchase are checked by the
    /// pricing engine before this is called.
    pub fn discount_for(&self, purchase_amount: f64) -> f64 {
        let raw = match self.kind() {
            DiscountType::Percentage => purchase_amount * (self.discount_value / 100.0),
            DiscountType::FixedAmount => self.discount_value,
        };

        let capped = match self.max_discount_amount {
            Some(max) if raw > max => max,
            _ => raw,
        };

        capped.min(purchase_amount)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(kind: DiscountType, value: f64) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            code: "TEST".into(),
            description: None,
            discount_type: kind.into(),
            discount_value: value,
            min_purchase_amount: 0.0,
            max_discount_amount: None,
            usage_limit: None,
            used_count: 0,
            valid_from: (now - Duration::days(1)).into(),
            valid_until: (now + Duration::days(1)).into(),
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let c = code(DiscountType::Percentage, 10.0);
        assert_eq!(c.discount_for(30.0), 3.0);
    }

    #[test]
    fn test_fixed_discount_never_exceeds_purchase() {
        let c = code(DiscountType::FixedAmount, 50.0);
        assert_eq!(c.discount_for(30.0), 30.0);
    }

    #[test]
    fn test_max_discount_cap() {
        let mut c = code(DiscountType::Percentage, 50.0);
        c.max_discount_amount = Some(5.0);
        assert_eq!(c.discount_for(30.0), 5.0);
    }

    #[test]
    fn test_validity_window_and_limit() {
        let now = Utc::now();
        let mut c = code(DiscountType::Percentage, 10.0);
        assert!(c.is_valid_at(now));

        c.usage_limit = Some(1);
        c.used_count = 1;
        assert!(!c.is_valid_at(now));

        c.used_count = 0;
        assert!(c.is_valid_at(now));
        assert!(!c.is_valid_at(now + Duration::days(2)));

        c.is_active = false;
        assert!(!c.is_valid_at(now));
    }
}
