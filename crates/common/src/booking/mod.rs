//! Booking domain core
//!
//! Four collaborators around a shared [`Store`](crate::store::Store):
//! - [`SeatInventory`]: seat availability and atomic reservation
//! - [`PricingEngine`]: deterministic price quotes
//! - [`LoyaltyLedger`]: point accrual and redemption
//! - [`BookingWorkflow`]: orchestration, compensation, notifications

mod inventory;
mod loyalty;
mod pricing;
mod workflow;

pub use inventory::SeatInventory;
pub use loyalty::{LoyaltyLedger, LoyaltySummary};
pub use pricing::{PriceBreakdown, PricingEngine};
pub use workflow::{BookingWorkflow, CreateBooking, SeatAvailability};

/// Points earned per currency unit spent
pub const POINTS_PER_CURRENCY_UNIT: i64 = 10;

/// Points required per currency unit of discount
pub const POINTS_PER_REDEMPTION_UNIT: i64 = 100;

/// Upper bound on seats in a single booking
pub const MAX_SEATS_PER_BOOKING: usize = 20;
