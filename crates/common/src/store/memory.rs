//! In-memory [`Store`] implementation
//!
//! Mirrors the transactional semantics of the Postgres repository behind a
//! single mutex: every multi-row operation runs under one lock acquisition,
//! so reservation, usage increments, and point debits are atomic exactly as
//! they are in the database. Used by tests and local development.

use super::{BookingWithSeats, NewBooking, NewDiscountCode, Store};
use crate::db::models::{
    Booking, BookingStatus, DiscountCode, Hall, LoyaltyAccount, Movie, Seat, SeatStatus, Showtime,
};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    halls: HashMap<Uuid, Hall>,
    movies: HashMap<Uuid, Movie>,
    showtimes: HashMap<Uuid, Showtime>,
    seats: HashMap<Uuid, Seat>,
    bookings: HashMap<Uuid, Booking>,
    booking_seats: HashMap<Uuid, Vec<Uuid>>,
    discount_codes: HashMap<String, DiscountCode>,
    loyalty: HashMap<Uuid, LoyaltyAccount>,
}

/// Mutex-guarded in-memory store
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a hall; returns its id
    pub fn add_hall(&self, name: &str, capacity: i32) -> Uuid {
        let id = Uuid::new_v4();
        let hall = Hall {
            id,
            name: name.to_string(),
            capacity,
            created_at: Utc::now().into(),
        };
        self.lock().halls.insert(id, hall);
        id
    }

    /// Seed a movie; returns its id
    pub fn add_movie(&self, title: &str, duration_minutes: i32) -> Uuid {
        let id = Uuid::new_v4();
        let movie = Movie {
            id,
            title: title.to_string(),
            duration_minutes,
            rating: None,
            created_at: Utc::now().into(),
        };
        self.lock().movies.insert(id, movie);
        id
    }

    /// Seed a showtime; returns its id
    pub fn add_showtime(
        &self,
        movie_id: Uuid,
        hall_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        price: f64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let showtime = Showtime {
            id,
            movie_id,
            hall_id,
            start_time: start_time.into(),
            end_time: end_time.into(),
            price,
        };
        self.lock().showtimes.insert(id, showtime);
        id
    }

    /// Seed one AVAILABLE seat in a hall; returns its id
    pub fn add_seat(&self, hall_id: Uuid, row: &str, number: i32) -> Uuid {
        self.add_seat_with_status(hall_id, row, number, SeatStatus::Available)
    }

    /// Seed one seat with an explicit status; returns its id
    pub fn add_seat_with_status(
        &self,
        hall_id: Uuid,
        row: &str,
        number: i32,
        status: SeatStatus,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let seat = Seat {
            id,
            hall_id,
            row: row.to_string(),
            number,
            status: status.into(),
        };
        self.lock().seats.insert(id, seat);
        id
    }

    /// Seed a discount code directly (bypassing `insert_discount_code`)
    pub fn add_discount_code(&self, code: DiscountCode) {
        self.lock().discount_codes.insert(code.code.clone(), code);
    }

    /// Current status of a seat. Test inspection helper.
    pub fn seat_status(&self, seat_id: Uuid) -> Option<SeatStatus> {
        self.lock().seats.get(&seat_id).map(Seat::seat_status)
    }

    /// Current used_count of a code. Test inspection helper.
    pub fn code_used_count(&self, code: &str) -> Option<i32> {
        self.lock().discount_codes.get(code).map(|c| c.used_count)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens if a holder panicked; propagating the
        // data is still sound for these maps.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_showtime(&self, id: Uuid) -> Result<Option<Showtime>> {
        Ok(self.lock().showtimes.get(&id).cloned())
    }

    async fn find_movie(&self, id: Uuid) -> Result<Option<Movie>> {
        Ok(self.lock().movies.get(&id).cloned())
    }

    async fn find_hall(&self, id: Uuid) -> Result<Option<Hall>> {
        Ok(self.lock().halls.get(&id).cloned())
    }

    async fn list_available_seats(&self, hall_id: Uuid) -> Result<Vec<Seat>> {
        let inner = self.lock();
        let mut seats: Vec<Seat> = inner
            .seats
            .values()
            .filter(|s| s.hall_id == hall_id && s.is_available())
            .cloned()
            .collect();
        seats.sort_by(|a, b| a.row.cmp(&b.row).then(a.number.cmp(&b.number)));
        Ok(seats)
    }

    async fn reserve_seats(&self, seat_ids: &[Uuid], hall_id: Uuid) -> Result<()> {
        let mut inner = self.lock();

        // Validate every seat before mutating any of them
        let mut conflicts = Vec::new();
        for id in seat_ids {
            let seat = inner
                .seats
                .get(id)
                .ok_or(AppError::SeatNotFound { id: *id })?;

            if seat.hall_id != hall_id {
                return Err(AppError::Validation {
                    message: format!("seat {} does not belong to hall {}", id, hall_id),
                    field: Some("seat_ids".into()),
                });
            }

            if !seat.is_available() {
                conflicts.push(*id);
            }
        }

        if !conflicts.is_empty() {
            return Err(AppError::SeatConflict { seat_ids: conflicts });
        }

        for id in seat_ids {
            if let Some(seat) = inner.seats.get_mut(id) {
                seat.status = SeatStatus::Reserved.into();
            }
        }

        Ok(())
    }

    async fn release_seats(&self, seat_ids: &[Uuid]) -> Result<()> {
        let mut inner = self.lock();
        for id in seat_ids {
            if let Some(seat) = inner.seats.get_mut(id) {
                if seat.seat_status() == SeatStatus::Reserved {
                    seat.status = SeatStatus::Available.into();
                }
            }
        }
        Ok(())
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<BookingWithSeats> {
        let mut inner = self.lock();
        let id = Uuid::new_v4();
        let row = Booking {
            id,
            user_id: booking.user_id,
            showtime_id: booking.showtime_id,
            total_seats: booking.seat_ids.len() as i32,
            total_amount: booking.total_amount,
            status: booking.status.into(),
            created_at: Utc::now().into(),
        };
        inner.bookings.insert(id, row.clone());
        inner.booking_seats.insert(id, booking.seat_ids.clone());

        Ok(BookingWithSeats {
            booking: row,
            seat_ids: booking.seat_ids,
        })
    }

    async fn booking_with_seats(&self, id: Uuid) -> Result<Option<BookingWithSeats>> {
        let inner = self.lock();
        Ok(inner.bookings.get(&id).map(|booking| BookingWithSeats {
            booking: booking.clone(),
            seat_ids: inner.booking_seats.get(&id).cloned().unwrap_or_default(),
        }))
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<BookingWithSeats>> {
        let inner = self.lock();
        let mut bookings: Vec<BookingWithSeats> = inner
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .map(|booking| BookingWithSeats {
                booking: booking.clone(),
                seat_ids: inner
                    .booking_seats
                    .get(&booking.id)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        bookings.sort_by(|a, b| b.booking.created_at.cmp(&a.booking.created_at));
        Ok(bookings)
    }

    async fn update_booking_seats(
        &self,
        id: Uuid,
        seat_ids: &[Uuid],
        total_amount: f64,
    ) -> Result<BookingWithSeats> {
        let mut inner = self.lock();
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or(AppError::BookingNotFound { id })?;

        // Same conditional transition as the Postgres repository: a booking
        // cancelled since the caller's check stays cancelled.
        if !booking.is_updatable() {
            return Err(AppError::Conflict {
                message: format!("a {} booking cannot be reseated", booking.status),
            });
        }

        booking.total_seats = seat_ids.len() as i32;
        booking.total_amount = total_amount;
        booking.status = BookingStatus::Updated.into();
        let snapshot = booking.clone();

        inner.booking_seats.insert(id, seat_ids.to_vec());

        Ok(BookingWithSeats {
            booking: snapshot,
            seat_ids: seat_ids.to_vec(),
        })
    }

    async fn set_booking_status(&self, id: Uuid, status: BookingStatus) -> Result<()> {
        let mut inner = self.lock();
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or(AppError::BookingNotFound { id })?;
        booking.status = status.into();
        Ok(())
    }

    async fn find_discount_code(&self, code: &str) -> Result<Option<DiscountCode>> {
        Ok(self.lock().discount_codes.get(code).cloned())
    }

    async fn increment_code_usage(&self, code: &str) -> Result<bool> {
        let mut inner = self.lock();
        let Some(row) = inner.discount_codes.get_mut(code) else {
            return Ok(false);
        };

        let under_limit = row.usage_limit.map_or(true, |limit| row.used_count < limit);
        if !row.is_active || !under_limit {
            return Ok(false);
        }

        row.used_count += 1;
        Ok(true)
    }

    async fn decrement_code_usage(&self, code: &str) -> Result<()> {
        let mut inner = self.lock();
        if let Some(row) = inner.discount_codes.get_mut(code) {
            row.used_count = (row.used_count - 1).max(0);
        }
        Ok(())
    }

    async fn insert_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode> {
        let mut inner = self.lock();
        if inner.discount_codes.contains_key(&code.code) {
            return Err(AppError::Conflict {
                message: format!("discount code {} already exists", code.code),
            });
        }

        let row = DiscountCode {
            id: Uuid::new_v4(),
            code: code.code.clone(),
            description: code.description,
            discount_type: code.discount_type.into(),
            discount_value: code.discount_value,
            min_purchase_amount: code.min_purchase_amount,
            max_discount_amount: code.max_discount_amount,
            usage_limit: code.usage_limit,
            used_count: 0,
            valid_from: code.valid_from.into(),
            valid_until: code.valid_until.into(),
            is_active: true,
        };
        inner.discount_codes.insert(code.code, row.clone());
        Ok(row)
    }

    async fn active_discount_codes(&self) -> Result<Vec<DiscountCode>> {
        let inner = self.lock();
        let mut codes: Vec<DiscountCode> = inner
            .discount_codes
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        codes.sort_by(|a, b| b.valid_from.cmp(&a.valid_from));
        Ok(codes)
    }

    async fn loyalty_account(&self, user_id: Uuid) -> Result<LoyaltyAccount> {
        let mut inner = self.lock();
        Ok(inner
            .loyalty
            .entry(user_id)
            .or_insert_with(|| blank_account(user_id))
            .clone())
    }

    async fn credit_points(&self, user_id: Uuid, points: i64) -> Result<()> {
        let mut inner = self.lock();
        let account = inner
            .loyalty
            .entry(user_id)
            .or_insert_with(|| blank_account(user_id));
        account.points_balance += points;
        account.total_earned += points;
        account.last_updated = Utc::now().into();
        Ok(())
    }

    async fn debit_points(&self, user_id: Uuid, points: i64) -> Result<bool> {
        let mut inner = self.lock();
        let account = inner
            .loyalty
            .entry(user_id)
            .or_insert_with(|| blank_account(user_id));

        if account.points_balance < points {
            return Ok(false);
        }

        account.points_balance -= points;
        account.total_redeemed += points;
        account.last_updated = Utc::now().into();
        Ok(true)
    }

    async fn refund_points(&self, user_id: Uuid, points: i64) -> Result<()> {
        let mut inner = self.lock();
        let account = inner
            .loyalty
            .entry(user_id)
            .or_insert_with(|| blank_account(user_id));

        if account.total_redeemed < points {
            return Err(AppError::Internal {
                message: format!("no matching debit to refund for user {}", user_id),
            });
        }

        account.points_balance += points;
        account.total_redeemed -= points;
        account.last_updated = Utc::now().into();
        Ok(())
    }
}

fn blank_account(user_id: Uuid) -> LoyaltyAccount {
    LoyaltyAccount {
        id: Uuid::new_v4(),
        user_id,
        points_balance: 0,
        total_earned: 0,
        total_redeemed: 0,
        last_updated: Utc::now().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_hall() -> (MemoryStore, Uuid, Vec<Uuid>) {
        let store = MemoryStore::new();
        let hall_id = Uuid::new_v4();
        let seats = (1..=4).map(|n| store.add_seat(hall_id, "A", n)).collect();
        (store, hall_id, seats)
    }

    #[tokio::test]
    async fn test_reserve_is_all_or_nothing() {
        let (store, hall_id, seats) = store_with_hall();

        // Take the last seat out from under the request
        store
            .reserve_seats(&seats[2..3], hall_id)
            .await
            .expect("single reserve");

        let err = store
            .reserve_seats(&seats[..3], hall_id)
            .await
            .expect_err("conflict");
        match err {
            AppError::SeatConflict { seat_ids } => assert_eq!(seat_ids, vec![seats[2]]),
            other => panic!("expected SeatConflict, got {other:?}"),
        }

        // Seats before the conflicting one were not touched
        assert_eq!(store.seat_status(seats[0]), Some(SeatStatus::Available));
        assert_eq!(store.seat_status(seats[1]), Some(SeatStatus::Available));
    }

    #[tokio::test]
    async fn test_reserve_rejects_foreign_hall() {
        let (store, hall_id, seats) = store_with_hall();
        let other_hall = Uuid::new_v4();
        let foreign = store.add_seat(other_hall, "B", 1);

        let err = store
            .reserve_seats(&[seats[0], foreign], hall_id)
            .await
            .expect_err("hall mismatch");
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(store.seat_status(seats[0]), Some(SeatStatus::Available));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (store, hall_id, seats) = store_with_hall();
        store.reserve_seats(&seats[..2], hall_id).await.unwrap();

        store.release_seats(&seats[..2]).await.unwrap();
        store.release_seats(&seats[..2]).await.unwrap();

        assert_eq!(store.seat_status(seats[0]), Some(SeatStatus::Available));
        assert_eq!(store.seat_status(seats[1]), Some(SeatStatus::Available));
    }

    #[tokio::test]
    async fn test_debit_points_is_exact() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.credit_points(user, 150).await.unwrap();

        assert!(!store.debit_points(user, 200).await.unwrap());
        assert!(store.debit_points(user, 150).await.unwrap());

        let account = store.loyalty_account(user).await.unwrap();
        assert_eq!(account.points_balance, 0);
        assert_eq!(account.total_earned, 150);
        assert_eq!(account.total_redeemed, 150);
    }
}
