//! End-to-end workflow behavior under concurrency and partial failure

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::future::join_all;
use seatwise_common::booking::{BookingWorkflow, CreateBooking};
use seatwise_common::db::models::{
    BookingStatus, DiscountCode, DiscountType, Hall, LoyaltyAccount, Movie, Seat, SeatStatus,
    Showtime,
};
use seatwise_common::errors::{AppError, Result};
use seatwise_common::notify::LogNotifier;
use seatwise_common::store::{BookingWithSeats, MemoryStore, NewBooking, NewDiscountCode, Store};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

struct Cinema {
    store: Arc<MemoryStore>,
    showtime_id: Uuid,
    hall_id: Uuid,
}

fn cinema(price: f64) -> Cinema {
    let store = Arc::new(MemoryStore::new());
    let movie = store.add_movie("Stalker", 162);
    let hall_id = Uuid::new_v4();
    let now = Utc::now();
    let showtime_id = store.add_showtime(movie, hall_id, now, now + Duration::hours(3), price);

    Cinema {
        store,
        showtime_id,
        hall_id,
    }
}

fn percentage_code(code: &str, percent: f64, usage_limit: Option<i32>) -> DiscountCode {
    let now = Utc::now();
    DiscountCode {
        id: Uuid::new_v4(),
        code: code.to_string(),
        description: None,
        discount_type: DiscountType::Percentage.into(),
        discount_value: percent,
        min_purchase_amount: 0.0,
        max_discount_amount: None,
        usage_limit,
        used_count: 0,
        valid_from: (now - Duration::days(1)).into(),
        valid_until: (now + Duration::days(1)).into(),
        is_active: true,
    }
}

#[tokio::test]
async fn concurrent_creates_for_the_same_seats_produce_one_winner() {
    let cx = cinema(12.0);
    let a = cx.store.add_seat(cx.hall_id, "D", 4);
    let b = cx.store.add_seat(cx.hall_id, "D", 5);

    let workflow = Arc::new(BookingWorkflow::new(
        Arc::clone(&cx.store),
        Arc::new(LogNotifier),
    ));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let workflow = Arc::clone(&workflow);
            let seat_ids = vec![a, b];
            let showtime_id = cx.showtime_id;
            tokio::spawn(async move {
                workflow
                    .create(CreateBooking {
                        user_id: Uuid::new_v4(),
                        showtime_id,
                        seat_ids,
                        discount_code: None,
                        points_to_redeem: None,
                    })
                    .await
            })
        })
        .collect();

    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(winners, 1, "exactly one caller may hold the seats");

    for outcome in outcomes.iter().filter(|o| o.is_err()) {
        assert!(matches!(
            outcome.as_ref().unwrap_err(),
            AppError::SeatConflict { .. }
        ));
    }

    assert_eq!(cx.store.seat_status(a), Some(SeatStatus::Reserved));
    assert_eq!(cx.store.seat_status(b), Some(SeatStatus::Reserved));
}

#[tokio::test]
async fn usage_limited_code_is_claimed_at_most_limit_times() {
    let cx = cinema(10.0);
    cx.store.add_discount_code(percentage_code("LAST1", 10.0, Some(1)));

    let workflow = Arc::new(BookingWorkflow::new(
        Arc::clone(&cx.store),
        Arc::new(LogNotifier),
    ));

    // Disjoint seats, so the only contended resource is the code.
    let seats: Vec<Uuid> = (0..6).map(|n| cx.store.add_seat(cx.hall_id, "B", n)).collect();

    let tasks: Vec<_> = seats
        .into_iter()
        .map(|seat| {
            let workflow = Arc::clone(&workflow);
            let showtime_id = cx.showtime_id;
            tokio::spawn(async move {
                workflow
                    .create(CreateBooking {
                        user_id: Uuid::new_v4(),
                        showtime_id,
                        seat_ids: vec![seat],
                        discount_code: Some("LAST1".to_string()),
                        points_to_redeem: None,
                    })
                    .await
            })
        })
        .collect();

    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(winners, 1);
    assert_eq!(cx.store.code_used_count("LAST1"), Some(1));
}

#[tokio::test]
async fn concurrent_redemptions_never_drive_the_balance_negative() {
    let cx = cinema(10.0);
    let user = Uuid::new_v4();
    cx.store.credit_points(user, 100).await.unwrap();

    let workflow = Arc::new(BookingWorkflow::new(
        Arc::clone(&cx.store),
        Arc::new(LogNotifier),
    ));

    let seats: Vec<Uuid> = (0..4).map(|n| cx.store.add_seat(cx.hall_id, "C", n)).collect();

    let tasks: Vec<_> = seats
        .into_iter()
        .map(|seat| {
            let workflow = Arc::clone(&workflow);
            let showtime_id = cx.showtime_id;
            tokio::spawn(async move {
                workflow
                    .create(CreateBooking {
                        user_id: user,
                        showtime_id,
                        seat_ids: vec![seat],
                        discount_code: None,
                        points_to_redeem: Some(100),
                    })
                    .await
            })
        })
        .collect();

    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    // At most one redemption can fit in a 100 point balance. Earned points
    // from a completed booking may fund a later one, but the balance can
    // never go below zero.
    assert!(outcomes.iter().any(|o| o.is_ok()));
    let summary = workflow.loyalty_summary(user).await.unwrap();
    assert!(summary.points_balance >= 0);
}

/// Store wrapper with switchable failure injection, for exercising the
/// compensation paths: the booking insert can fail, the next seat release
/// can fail once, and a rival cancel can be slipped in during a reserve.
struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_insert: AtomicBool,
    fail_release_once: AtomicBool,
    cancel_during_reserve: Mutex<Option<Uuid>>,
}

impl FlakyStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_insert: AtomicBool::new(false),
            fail_release_once: AtomicBool::new(false),
            cancel_during_reserve: Mutex::new(None),
        }
    }

    fn arm_cancel_during_reserve(&self, booking_id: Uuid) {
        *self.cancel_during_reserve.lock().unwrap() = Some(booking_id);
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn find_showtime(&self, id: Uuid) -> Result<Option<Showtime>> {
        self.inner.find_showtime(id).await
    }

    async fn find_movie(&self, id: Uuid) -> Result<Option<Movie>> {
        self.inner.find_movie(id).await
    }

    async fn find_hall(&self, id: Uuid) -> Result<Option<Hall>> {
        self.inner.find_hall(id).await
    }

    async fn list_available_seats(&self, hall_id: Uuid) -> Result<Vec<Seat>> {
        self.inner.list_available_seats(hall_id).await
    }

    async fn reserve_seats(&self, seat_ids: &[Uuid], hall_id: Uuid) -> Result<()> {
        self.inner.reserve_seats(seat_ids, hall_id).await?;

        // A rival cancel landing between the caller's state check and the
        // seat-set write
        let armed = self.cancel_during_reserve.lock().unwrap().take();
        if let Some(booking_id) = armed {
            if let Some(row) = self.inner.booking_with_seats(booking_id).await? {
                self.inner.release_seats(&row.seat_ids).await?;
                self.inner
                    .set_booking_status(booking_id, BookingStatus::Cancelled)
                    .await?;
            }
        }

        Ok(())
    }

    async fn release_seats(&self, seat_ids: &[Uuid]) -> Result<()> {
        if self.fail_release_once.swap(false, Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection {
                message: "connection reset".to_string(),
            });
        }
        self.inner.release_seats(seat_ids).await
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<BookingWithSeats> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection {
                message: "connection reset".to_string(),
            });
        }
        self.inner.insert_booking(booking).await
    }

    async fn booking_with_seats(&self, id: Uuid) -> Result<Option<BookingWithSeats>> {
        self.inner.booking_with_seats(id).await
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<BookingWithSeats>> {
        self.inner.bookings_for_user(user_id).await
    }

    async fn update_booking_seats(
        &self,
        id: Uuid,
        seat_ids: &[Uuid],
        total_amount: f64,
    ) -> Result<BookingWithSeats> {
        self.inner.update_booking_seats(id, seat_ids, total_amount).await
    }

    async fn set_booking_status(&self, id: Uuid, status: BookingStatus) -> Result<()> {
        self.inner.set_booking_status(id, status).await
    }

    async fn find_discount_code(&self, code: &str) -> Result<Option<DiscountCode>> {
        self.inner.find_discount_code(code).await
    }

    async fn increment_code_usage(&self, code: &str) -> Result<bool> {
        self.inner.increment_code_usage(code).await
    }

    async fn decrement_code_usage(&self, code: &str) -> Result<()> {
        self.inner.decrement_code_usage(code).await
    }

    async fn insert_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode> {
        self.inner.insert_discount_code(code).await
    }

    async fn active_discount_codes(&self) -> Result<Vec<DiscountCode>> {
        self.inner.active_discount_codes().await
    }

    async fn loyalty_account(&self, user_id: Uuid) -> Result<LoyaltyAccount> {
        self.inner.loyalty_account(user_id).await
    }

    async fn credit_points(&self, user_id: Uuid, points: i64) -> Result<()> {
        self.inner.credit_points(user_id, points).await
    }

    async fn debit_points(&self, user_id: Uuid, points: i64) -> Result<bool> {
        self.inner.debit_points(user_id, points).await
    }

    async fn refund_points(&self, user_id: Uuid, points: i64) -> Result<()> {
        self.inner.refund_points(user_id, points).await
    }
}

#[tokio::test]
async fn failed_persistence_rolls_back_seats_usage_and_points() {
    let cx = cinema(10.0);
    let seat = cx.store.add_seat(cx.hall_id, "E", 1);
    cx.store.add_discount_code(percentage_code("ROLLBACK", 10.0, Some(3)));

    let user = Uuid::new_v4();
    cx.store.credit_points(user, 300).await.unwrap();

    let flaky = Arc::new(FlakyStore::new(Arc::clone(&cx.store)));
    flaky.fail_insert.store(true, Ordering::SeqCst);
    let workflow = BookingWorkflow::new(Arc::clone(&flaky), Arc::new(LogNotifier));

    let err = workflow
        .create(CreateBooking {
            user_id: user,
            showtime_id: cx.showtime_id,
            seat_ids: vec![seat],
            discount_code: Some("ROLLBACK".to_string()),
            points_to_redeem: Some(300),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DatabaseConnection { .. }));

    // Every side effect was compensated
    assert_eq!(cx.store.seat_status(seat), Some(SeatStatus::Available));
    assert_eq!(cx.store.code_used_count("ROLLBACK"), Some(0));
    let account = cx.store.loyalty_account(user).await.unwrap();
    assert_eq!(account.points_balance, 300);
    // The refunded debit left no mark on the lifetime totals either
    assert_eq!(account.total_earned, 300);
    assert_eq!(account.total_redeemed, 0);
    assert!(cx.store.bookings_for_user(user).await.unwrap().is_empty());

    // The same request succeeds once the store recovers
    flaky.fail_insert.store(false, Ordering::SeqCst);
    let created = workflow
        .create(CreateBooking {
            user_id: user,
            showtime_id: cx.showtime_id,
            seat_ids: vec![seat],
            discount_code: Some("ROLLBACK".to_string()),
            points_to_redeem: Some(300),
        })
        .await
        .unwrap();

    // 10 base, 1 code discount, 3 points discount
    assert_eq!(created.booking.total_amount, 6.0);
    assert_eq!(cx.store.code_used_count("ROLLBACK"), Some(1));
}

#[tokio::test]
async fn cancel_racing_an_update_is_never_resurrected() {
    let cx = cinema(10.0);
    let a = cx.store.add_seat(cx.hall_id, "G", 1);
    let b = cx.store.add_seat(cx.hall_id, "G", 2);
    let c = cx.store.add_seat(cx.hall_id, "G", 3);
    let user = Uuid::new_v4();

    let flaky = Arc::new(FlakyStore::new(Arc::clone(&cx.store)));
    let workflow = BookingWorkflow::new(Arc::clone(&flaky), Arc::new(LogNotifier));

    let created = workflow
        .create(CreateBooking {
            user_id: user,
            showtime_id: cx.showtime_id,
            seat_ids: vec![a, b],
            discount_code: None,
            points_to_redeem: None,
        })
        .await
        .unwrap();

    // The cancel commits while the update is reserving its added seat,
    // after the update's own state check already passed.
    flaky.arm_cancel_during_reserve(created.booking.id);
    let err = workflow
        .update(user, created.booking.id, vec![a, c])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    // The booking stays cancelled and every seat went back to the pool:
    // a and b from the cancel, c from the failed update's compensation.
    let row = cx.store.booking_with_seats(created.booking.id).await.unwrap().unwrap();
    assert_eq!(row.booking.booking_status(), BookingStatus::Cancelled);
    assert_eq!(cx.store.seat_status(a), Some(SeatStatus::Available));
    assert_eq!(cx.store.seat_status(b), Some(SeatStatus::Available));
    assert_eq!(cx.store.seat_status(c), Some(SeatStatus::Available));

    // A rival can now take seat a; only one non-cancelled booking claims it
    let rival = workflow
        .create(CreateBooking {
            user_id: Uuid::new_v4(),
            showtime_id: cx.showtime_id,
            seat_ids: vec![a],
            discount_code: None,
            points_to_redeem: None,
        })
        .await
        .unwrap();
    assert_eq!(rival.booking.booking_status(), BookingStatus::Pending);
    assert_eq!(cx.store.seat_status(a), Some(SeatStatus::Reserved));
}

#[tokio::test]
async fn failed_seat_release_keeps_the_cancel_retryable() {
    let cx = cinema(10.0);
    let seat = cx.store.add_seat(cx.hall_id, "H", 1);
    let user = Uuid::new_v4();

    let flaky = Arc::new(FlakyStore::new(Arc::clone(&cx.store)));
    let workflow = BookingWorkflow::new(Arc::clone(&flaky), Arc::new(LogNotifier));

    let created = workflow
        .create(CreateBooking {
            user_id: user,
            showtime_id: cx.showtime_id,
            seat_ids: vec![seat],
            discount_code: None,
            points_to_redeem: None,
        })
        .await
        .unwrap();

    // The release fails transiently; the booking must stay active so a
    // retry still has work to do, instead of a cancelled booking keeping
    // its seat reserved forever.
    flaky.fail_release_once.store(true, Ordering::SeqCst);
    let err = workflow.cancel(user, created.booking.id).await.unwrap_err();
    assert!(matches!(err, AppError::DatabaseConnection { .. }));

    let row = cx.store.booking_with_seats(created.booking.id).await.unwrap().unwrap();
    assert_eq!(row.booking.booking_status(), BookingStatus::Pending);
    assert_eq!(cx.store.seat_status(seat), Some(SeatStatus::Reserved));

    // The retry completes the cancel
    workflow.cancel(user, created.booking.id).await.unwrap();
    let row = cx.store.booking_with_seats(created.booking.id).await.unwrap().unwrap();
    assert_eq!(row.booking.booking_status(), BookingStatus::Cancelled);
    assert_eq!(cx.store.seat_status(seat), Some(SeatStatus::Available));
}

#[tokio::test]
async fn cancelled_bookings_are_kept_for_history() {
    let cx = cinema(10.0);
    let seat = cx.store.add_seat(cx.hall_id, "F", 1);
    let user = Uuid::new_v4();

    let workflow = BookingWorkflow::new(Arc::clone(&cx.store), Arc::new(LogNotifier));
    let created = workflow
        .create(CreateBooking {
            user_id: user,
            showtime_id: cx.showtime_id,
            seat_ids: vec![seat],
            discount_code: None,
            points_to_redeem: None,
        })
        .await
        .unwrap();

    workflow.cancel(user, created.booking.id).await.unwrap();

    let history = workflow.bookings(user).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].booking.booking_status(),
        BookingStatus::Cancelled
    );
}
