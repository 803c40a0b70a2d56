//! Persistence boundary for the booking core
//!
//! The booking core talks to durable storage only through the [`Store`]
//! trait. The production implementation is the SeaORM-backed
//! [`Repository`](crate::db::Repository); [`MemoryStore`] provides the same
//! semantics over in-process maps for tests and local development.
//!
//! Contract highlights:
//! - `reserve_seats` is all-or-nothing: either every requested seat
//!   transitions AVAILABLE -> RESERVED or none does.
//! - `increment_code_usage` and `debit_points` are compare-and-swap
//!   operations; callers must treat `false` as a lost race, not an error.

mod memory;

pub use memory::MemoryStore;

use crate::db::models::{
    Booking, BookingStatus, DiscountCode, DiscountType, Hall, LoyaltyAccount, Movie, Seat,
    Showtime,
};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Payload for creating a booking row plus its seat claims
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub total_amount: f64,
    pub status: BookingStatus,
}

/// A booking together with the seat ids it currently claims
#[derive(Debug, Clone)]
pub struct BookingWithSeats {
    pub booking: Booking,
    pub seat_ids: Vec<Uuid>,
}

/// Payload for creating a discount code
#[derive(Debug, Clone)]
pub struct NewDiscountCode {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub min_purchase_amount: f64,
    pub max_discount_amount: Option<f64>,
    pub usage_limit: Option<i32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Durable storage operations consumed by the booking core
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // ------------------------------------------------------------------
    // Showtimes and movies
    // ------------------------------------------------------------------

    async fn find_showtime(&self, id: Uuid) -> Result<Option<Showtime>>;

    async fn find_movie(&self, id: Uuid) -> Result<Option<Movie>>;

    async fn find_hall(&self, id: Uuid) -> Result<Option<Hall>>;

    // ------------------------------------------------------------------
    // Seats
    // ------------------------------------------------------------------

    /// All AVAILABLE seats of a hall, ordered by row then number
    async fn list_available_seats(&self, hall_id: Uuid) -> Result<Vec<Seat>>;

    /// Atomically transition every seat AVAILABLE -> RESERVED.
    ///
    /// Verifies that each seat exists, belongs to `hall_id`, and is
    /// AVAILABLE. On any failure no seat is mutated and the error names
    /// the offending seat id(s): `SeatNotFound`, `Validation` (wrong
    /// hall), or `SeatConflict` (already taken).
    async fn reserve_seats(&self, seat_ids: &[Uuid], hall_id: Uuid) -> Result<()>;

    /// Transition seats RESERVED -> AVAILABLE. Idempotent: seats that are
    /// already AVAILABLE are left untouched.
    async fn release_seats(&self, seat_ids: &[Uuid]) -> Result<()>;

    // ------------------------------------------------------------------
    // Bookings
    // ------------------------------------------------------------------

    /// Persist a booking row and its seat claims in one transaction
    async fn insert_booking(&self, booking: NewBooking) -> Result<BookingWithSeats>;

    async fn booking_with_seats(&self, id: Uuid) -> Result<Option<BookingWithSeats>>;

    /// Caller's bookings, newest first
    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<BookingWithSeats>>;

    /// Replace the booking's seat set, update the total, and mark the
    /// booking UPDATED, all in one transaction.
    ///
    /// The transition is conditional: only PENDING or UPDATED bookings are
    /// touched. A booking that was cancelled (or confirmed) after the
    /// caller's own state check fails with `Conflict` instead of being
    /// resurrected.
    async fn update_booking_seats(
        &self,
        id: Uuid,
        seat_ids: &[Uuid],
        total_amount: f64,
    ) -> Result<BookingWithSeats>;

    async fn set_booking_status(&self, id: Uuid, status: BookingStatus) -> Result<()>;

    // ------------------------------------------------------------------
    // Discount codes
    // ------------------------------------------------------------------

    async fn find_discount_code(&self, code: &str) -> Result<Option<DiscountCode>>;

    /// Compare-and-swap usage increment. Returns false when the code is
    /// inactive or its usage limit has been reached; the counter never
    /// exceeds the limit even under concurrent redemption.
    async fn increment_code_usage(&self, code: &str) -> Result<bool>;

    /// Undo a usage increment. Compensation path only.
    async fn decrement_code_usage(&self, code: &str) -> Result<()>;

    async fn insert_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode>;

    async fn active_discount_codes(&self) -> Result<Vec<DiscountCode>>;

    // ------------------------------------------------------------------
    // Loyalty accounts
    // ------------------------------------------------------------------

    /// The user's account, created lazily with a zero balance
    async fn loyalty_account(&self, user_id: Uuid) -> Result<LoyaltyAccount>;

    /// Credit points to the account (lazy create). Always succeeds.
    async fn credit_points(&self, user_id: Uuid, points: i64) -> Result<()>;

    /// Compare-and-swap debit. Returns false when the balance is below
    /// `points`; no partial debit is ever applied.
    async fn debit_points(&self, user_id: Uuid, points: i64) -> Result<bool>;

    /// Undo a debit: restores the balance and decrements total_redeemed,
    /// so lifetime totals reflect only bookings that went through.
    /// Compensation path only; must follow a successful `debit_points`.
    async fn refund_points(&self, user_id: Uuid, points: i64) -> Result<()>;
}
