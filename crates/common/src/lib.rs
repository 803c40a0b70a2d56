//! Seatwise Common Library
//!
//! Shared code for the Seatwise services:
//! - Database models and the repository
//! - Booking domain core (inventory, pricing, loyalty, workflow)
//! - Notification messages and queue client
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod booking;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod notify;
pub mod store;

// Re-export commonly used types
pub use booking::{BookingWorkflow, CreateBooking, LoyaltySummary, PriceBreakdown};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use store::{BookingWithSeats, MemoryStore, Store};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
