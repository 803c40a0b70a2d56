//! Seat entity
//!
//! Seats are created at hall-seeding time and never destroyed; only their
//! status cycles. All status transitions go through the seat inventory.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Seat status enum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Reserved,
    Occupied,
    Maintenance,
}

impl From<&str> for SeatStatus {
    fn from(s: &str) -> Self {
        match s {
            "AVAILABLE" => SeatStatus::Available,
            "RESERVED" => SeatStatus::Reserved,
            "OCCUPIED" => SeatStatus::Occupied,
            "MAINTENANCE" => SeatStatus::Maintenance,
            _ => SeatStatus::Maintenance,
        }
    }
}

impl From<SeatStatus> for String {
    fn from(status: SeatStatus) -> Self {
        match status {
            SeatStatus::Available => "AVAILABLE".to_string(),
            SeatStatus::Reserved => "RESERVED".to_string(),
            SeatStatus::Occupied => "OCCUPIED".to_string(),
            SeatStatus::Maintenance => "MAINTENANCE".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "seats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub hall_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub row: String,

    pub number: i32,

    #[sea_orm(column_type = "Text")]
    pub status: String,
}

impl Model {
    /// Get the seat status as an enum
    pub fn seat_status(&self) -> SeatStatus {
        SeatStatus::from(self.status.as_str())
    }

    /// Check whether the seat can be reserved
    pub fn is_available(&self) -> bool {
        self.seat_status() == SeatStatus::Available
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::hall::Entity",
        from = "Column::HallId",
        to = "super::hall::Column::Id"
    )]
    Hall,
}

impl Related<super::hall::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Hall.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            SeatStatus::Available,
            SeatStatus::Reserved,
            SeatStatus::Occupied,
            SeatStatus::Maintenance,
        ] {
            let s: String = status.into();
            assert_eq!(SeatStatus::from(s.as_str()), status);
        }
    }
}
