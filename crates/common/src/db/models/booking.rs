//! Booking entity
//!
//! Bookings are never physically deleted; cancellation marks them CANCELLED
//! to preserve referential history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Booking status enum
///
/// PENDING -> {UPDATED, CANCELLED}; UPDATED -> {UPDATED, CANCELLED};
/// CONFIRMED is set by the external payment confirmation event and is a
/// valid predecessor to CANCELLED.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Updated,
    Cancelled,
}

impl From<&str> for BookingStatus {
    fn from(s: &str) -> Self {
        match s {
            "PENDING" => BookingStatus::Pending,
            "CONFIRMED" => BookingStatus::Confirmed,
            "UPDATED" => BookingStatus::Updated,
            "CANCELLED" => BookingStatus::Cancelled,
            _ => BookingStatus::Cancelled,
        }
    }
}

impl From<BookingStatus> for String {
    fn from(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Pending => "PENDING".to_string(),
            BookingStatus::Confirmed => "CONFIRMED".to_string(),
            BookingStatus::Updated => "UPDATED".to_string(),
            BookingStatus::Cancelled => "CANCELLED".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    pub showtime_id: Uuid,

    pub total_seats: i32,

    /// Final amount after discounts. Always >= 0.
    #[sea_orm(column_type = "Double")]
    pub total_amount: f64,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the booking status as an enum
    pub fn booking_status(&self) -> BookingStatus {
        BookingStatus::from(self.status.as_str())
    }

    /// Check whether the booking still holds its seats
    pub fn is_active(&self) -> bool {
        self.booking_status() != BookingStatus::Cancelled
    }

    /// Check whether a seat-set change is permitted from the current state
    pub fn is_updatable(&self) -> bool {
        matches!(
            self.booking_status(),
            BookingStatus::Pending | BookingStatus::Updated
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::showtime::Entity",
        from = "Column::ShowtimeId",
        to = "super::showtime::Column::Id"
    )]
    Showtime,

    #[sea_orm(has_many = "super::booking_seat::Entity")]
    BookingSeats,
}

impl Related<super::showtime::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Showtime.def()
    }
}

impl Related<super::booking_seat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingSeats.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_predicates() {
        let mut booking = Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            showtime_id: Uuid::new_v4(),
            total_seats: 2,
            total_amount: 30.0,
            status: BookingStatus::Pending.into(),
            created_at: chrono::Utc::now().into(),
        };
        assert!(booking.is_active());
        assert!(booking.is_updatable());

        booking.status = BookingStatus::Confirmed.into();
        assert!(booking.is_active());
        // CONFIRMED bookings are cancelled, not reseated, by this core
        assert!(!booking.is_updatable());

        booking.status = BookingStatus::Cancelled.into();
        assert!(!booking.is_active());
        assert!(!booking.is_updatable());
    }
}
