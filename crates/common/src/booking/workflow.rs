//! Booking orchestration
//!
//! Drives create / update / cancel across the inventory, pricing and
//! loyalty collaborators. Every step after seat reservation has a
//! compensation path: on failure the seats are released and any counter
//! increment or point debit is undone, so a failed booking leaves no
//! trace. Bookings are never deleted; cancellation is a status change.

use crate::booking::{LoyaltyLedger, LoyaltySummary, PriceBreakdown, PricingEngine, SeatInventory};
use crate::booking::MAX_SEATS_PER_BOOKING;
use crate::db::models::{BookingStatus, Hall, Seat, Showtime};
use crate::errors::{AppError, Result};
use crate::notify::{NotificationMessage, Notifier};
use crate::store::{BookingWithSeats, NewBooking, Store};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Request to create a booking
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub user_id: Uuid,
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub discount_code: Option<String>,
    pub points_to_redeem: Option<i64>,
}

/// Seat availability for one showtime
#[derive(Debug, Clone)]
pub struct SeatAvailability {
    pub showtime: Showtime,
    pub hall: Option<Hall>,
    pub seats: Vec<Seat>,
}

/// Orchestrates the booking lifecycle over a [`Store`]
pub struct BookingWorkflow<S: Store> {
    store: Arc<S>,
    inventory: SeatInventory<S>,
    pricing: PricingEngine<S>,
    loyalty: LoyaltyLedger<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: Store> BookingWorkflow<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inventory: SeatInventory::new(Arc::clone(&store)),
            pricing: PricingEngine::new(Arc::clone(&store)),
            loyalty: LoyaltyLedger::new(Arc::clone(&store)),
            store,
            notifier,
        }
    }

    pub fn inventory(&self) -> &SeatInventory<S> {
        &self.inventory
    }

    pub fn pricing(&self) -> &PricingEngine<S> {
        &self.pricing
    }

    pub fn loyalty(&self) -> &LoyaltyLedger<S> {
        &self.loyalty
    }

    /// All AVAILABLE seats for a showtime's hall
    pub async fn list_available_seats(&self, showtime_id: Uuid) -> Result<SeatAvailability> {
        let showtime = self.showtime(showtime_id).await?;
        let hall = self.store.find_hall(showtime.hall_id).await?;
        let seats = self.inventory.list_available(showtime.hall_id).await?;

        Ok(SeatAvailability {
            showtime,
            hall,
            seats,
        })
    }

    /// Price a prospective booking without reserving anything
    pub async fn quote(
        &self,
        user_id: Uuid,
        showtime_id: Uuid,
        seat_count: usize,
        discount_code: Option<&str>,
        points_to_redeem: Option<i64>,
    ) -> Result<PriceBreakdown> {
        let showtime = self.showtime(showtime_id).await?;
        self.pricing
            .quote(user_id, &showtime, seat_count, discount_code, points_to_redeem)
            .await
    }

    /// Create a booking: reserve seats, apply discounts, persist, earn
    /// points, notify.
    ///
    /// Failure at any step rolls back everything done so far. The two
    /// discount writes (usage counter, point debit) are conditional
    /// updates, so a concurrent booking that exhausts the code or drains
    /// the balance makes this one fail fast with its seats released.
    pub async fn create(&self, request: CreateBooking) -> Result<BookingWithSeats> {
        let started = Instant::now();

        validate_seat_selection(&request.seat_ids)?;
        let showtime = self.showtime(request.showtime_id).await?;

        self.inventory
            .reserve(&request.seat_ids, showtime.hall_id)
            .await?;

        let quote = match self
            .pricing
            .quote(
                request.user_id,
                &showtime,
                request.seat_ids.len(),
                request.discount_code.as_deref(),
                request.points_to_redeem,
            )
            .await
        {
            Ok(quote) => quote,
            Err(err) => {
                self.release_quietly(&request.seat_ids).await;
                return Err(err);
            }
        };

        // The quote validated the code against a snapshot; the conditional
        // increment is what actually claims a use under concurrency.
        let mut code_claimed: Option<&str> = None;
        if let Some(code) = request.discount_code.as_deref() {
            match self.store.increment_code_usage(code).await {
                Ok(true) => code_claimed = Some(code),
                Ok(false) => {
                    self.release_quietly(&request.seat_ids).await;
                    return Err(AppError::Validation {
                        message: format!("discount code {}: no longer redeemable", code),
                        field: Some("discount_code".to_string()),
                    });
                }
                Err(err) => {
                    self.release_quietly(&request.seat_ids).await;
                    return Err(err);
                }
            }
        }

        if quote.points_redeemed > 0 {
            if let Err(err) = self
                .loyalty
                .redeem(request.user_id, quote.points_redeemed)
                .await
            {
                self.release_quietly(&request.seat_ids).await;
                self.unclaim_quietly(code_claimed).await;
                return Err(err);
            }
        }

        let created = match self
            .store
            .insert_booking(NewBooking {
                user_id: request.user_id,
                showtime_id: request.showtime_id,
                seat_ids: request.seat_ids.clone(),
                total_amount: quote.final_amount,
                status: BookingStatus::Pending,
            })
            .await
        {
            Ok(created) => created,
            Err(err) => {
                self.release_quietly(&request.seat_ids).await;
                self.unclaim_quietly(code_claimed).await;
                if quote.points_redeemed > 0 {
                    if let Err(refund_err) = self
                        .loyalty
                        .refund(request.user_id, quote.points_redeemed)
                        .await
                    {
                        tracing::error!(
                            user_id = %request.user_id,
                            points = quote.points_redeemed,
                            error = %refund_err,
                            "Failed to refund points after aborted booking"
                        );
                    }
                }
                return Err(err);
            }
        };

        // Accrual happens after the booking is durable; a credit failure
        // must not take the booking down with it.
        if let Err(err) = self.loyalty.earn(request.user_id, quote.final_amount).await {
            tracing::error!(
                booking_id = %created.booking.id,
                error = %err,
                "Failed to credit earned points"
            );
        }

        crate::metrics::record_booking_created(
            started.elapsed().as_secs_f64(),
            created.seat_ids.len(),
        );
        tracing::info!(
            booking_id = %created.booking.id,
            user_id = %request.user_id,
            seats = created.seat_ids.len(),
            total = quote.final_amount,
            "Booking created"
        );

        self.dispatch(NotificationMessage::BookingConfirmed {
            user_id: request.user_id,
            booking_id: created.booking.id,
            movie_title: self.movie_title(&showtime).await,
            start_time: showtime.start_time.with_timezone(&Utc),
        });

        Ok(created)
    }

    /// Replace a booking's seat set.
    ///
    /// New seats are reserved before old ones are released, so the caller
    /// never loses their current seats to a failed swap. Seats common to
    /// both sets are never touched. The total is recomputed as price times
    /// seat count; discounts are not re-applied.
    pub async fn update(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        new_seat_ids: Vec<Uuid>,
    ) -> Result<BookingWithSeats> {
        validate_seat_selection(&new_seat_ids)?;

        // Fast-path rejection; the store re-checks the state under its own
        // transaction, so a cancel racing past this point still wins.
        let current = self.owned_booking(user_id, booking_id).await?;
        if !current.booking.is_updatable() {
            return Err(AppError::Conflict {
                message: format!("a {} booking cannot be reseated", current.booking.status),
            });
        }

        let showtime = self.showtime(current.booking.showtime_id).await?;

        let old: HashSet<Uuid> = current.seat_ids.iter().copied().collect();
        let new: HashSet<Uuid> = new_seat_ids.iter().copied().collect();
        let added: Vec<Uuid> = new_seat_ids.iter().filter(|id| !old.contains(id)).copied().collect();
        let removed: Vec<Uuid> = current.seat_ids.iter().filter(|id| !new.contains(id)).copied().collect();

        if !added.is_empty() {
            self.inventory.reserve(&added, showtime.hall_id).await?;
        }

        let total_amount = showtime.price * new_seat_ids.len() as f64;
        let updated = match self
            .store
            .update_booking_seats(booking_id, &new_seat_ids, total_amount)
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                self.release_quietly(&added).await;
                return Err(err);
            }
        };

        // Old exclusive seats go back to the pool only after the swap is
        // durable.
        self.release_quietly(&removed).await;

        crate::metrics::record_booking_updated();
        tracing::info!(
            booking_id = %booking_id,
            added = added.len(),
            removed = removed.len(),
            total = total_amount,
            "Booking reseated"
        );

        self.dispatch(NotificationMessage::BookingUpdated {
            user_id,
            booking_id,
            movie_title: self.movie_title(&showtime).await,
            start_time: showtime.start_time.with_timezone(&Utc),
            total_seats: updated.booking.total_seats,
        });

        Ok(updated)
    }

    /// Cancel a booking, releasing its seats. Idempotent: cancelling an
    /// already-cancelled booking succeeds without changing any state.
    pub async fn cancel(&self, user_id: Uuid, booking_id: Uuid) -> Result<()> {
        let current = self.owned_booking(user_id, booking_id).await?;

        if current.booking.booking_status() == BookingStatus::Cancelled {
            // The seats may already belong to someone else; touch nothing.
            return Ok(());
        }

        // Seats go back first. If the status write fails the booking is
        // still active and a retry releases again (a no-op); the reverse
        // order could strand seats RESERVED behind a cancelled booking.
        self.inventory.release(&current.seat_ids).await?;
        self.store
            .set_booking_status(booking_id, BookingStatus::Cancelled)
            .await?;

        crate::metrics::record_booking_cancelled();
        tracing::info!(booking_id = %booking_id, "Booking cancelled");

        if let Ok(showtime) = self.showtime(current.booking.showtime_id).await {
            self.dispatch(NotificationMessage::BookingCancelled {
                user_id,
                booking_id,
                movie_title: self.movie_title(&showtime).await,
                start_time: showtime.start_time.with_timezone(&Utc),
            });
        }

        Ok(())
    }

    /// Fetch one booking; only the owner may see it
    pub async fn booking(&self, user_id: Uuid, booking_id: Uuid) -> Result<BookingWithSeats> {
        self.owned_booking(user_id, booking_id).await
    }

    /// The caller's bookings, newest first
    pub async fn bookings(&self, user_id: Uuid) -> Result<Vec<BookingWithSeats>> {
        self.store.bookings_for_user(user_id).await
    }

    /// The caller's loyalty standing
    pub async fn loyalty_summary(&self, user_id: Uuid) -> Result<LoyaltySummary> {
        self.loyalty.summary(user_id).await
    }

    async fn showtime(&self, id: Uuid) -> Result<Showtime> {
        self.store
            .find_showtime(id)
            .await?
            .ok_or(AppError::ShowtimeNotFound { id })
    }

    async fn owned_booking(&self, user_id: Uuid, booking_id: Uuid) -> Result<BookingWithSeats> {
        let found = self
            .store
            .booking_with_seats(booking_id)
            .await?
            .ok_or(AppError::BookingNotFound { id: booking_id })?;

        if found.booking.user_id != user_id {
            return Err(AppError::Forbidden {
                message: "booking belongs to another user".to_string(),
            });
        }

        Ok(found)
    }

    async fn movie_title(&self, showtime: &Showtime) -> String {
        match self.store.find_movie(showtime.movie_id).await {
            Ok(Some(movie)) => movie.title,
            _ => String::new(),
        }
    }

    /// Compensation release; the original error wins, release failures are
    /// only logged
    async fn release_quietly(&self, seat_ids: &[Uuid]) {
        if let Err(err) = self.inventory.release(seat_ids).await {
            tracing::error!(count = seat_ids.len(), error = %err, "Compensating seat release failed");
        }
    }

    async fn unclaim_quietly(&self, code: Option<&str>) {
        if let Some(code) = code {
            if let Err(err) = self.store.decrement_code_usage(code).await {
                tracing::error!(code, error = %err, "Compensating usage decrement failed");
            }
        }
    }

    fn dispatch(&self, message: NotificationMessage) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(&message).await {
                tracing::warn!(kind = message.kind(), error = %err, "Notification dispatch failed");
            }
        });
    }
}

fn validate_seat_selection(seat_ids: &[Uuid]) -> Result<()> {
    if seat_ids.is_empty() {
        return Err(AppError::Validation {
            message: "a booking needs at least one seat".to_string(),
            field: Some("seat_ids".to_string()),
        });
    }
    if seat_ids.len() > MAX_SEATS_PER_BOOKING {
        return Err(AppError::Validation {
            message: format!("a booking may claim at most {} seats", MAX_SEATS_PER_BOOKING),
            field: Some("seat_ids".to_string()),
        });
    }

    let mut seen = HashSet::with_capacity(seat_ids.len());
    for id in seat_ids {
        if !seen.insert(id) {
            return Err(AppError::Validation {
                message: format!("seat {} is listed more than once", id),
                field: Some("seat_ids".to_string()),
            });
        }
    }

    Ok(())
}
