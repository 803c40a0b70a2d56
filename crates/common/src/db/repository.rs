//! SeaORM-backed implementation of the Store trait
//!
//! All multi-row invariants live here:
//! - seat reservation locks its rows with `SELECT ... FOR UPDATE` in
//!   ascending-id order inside one transaction
//! - discount usage and point debits are conditional single-statement
//!   updates, so losers of a race observe `rows_affected == 0`

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::store::{BookingWithSeats, NewBooking, NewDiscountCode, Store};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, Set, Statement, TransactionTrait, Value,
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Seat ids claimed by each of the given bookings
    async fn seat_ids_by_booking(&self, booking_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        if booking_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = BookingSeatEntity::find()
            .filter(BookingSeatColumn::BookingId.is_in(booking_ids.to_vec()))
            .order_by_asc(BookingSeatColumn::SeatId)
            .all(self.read_conn())
            .await?;

        let mut by_booking: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for row in rows {
            by_booking.entry(row.booking_id).or_default().push(row.seat_id);
        }

        Ok(by_booking)
    }
}

/// `$start, $start+1, ..` placeholder list for dynamic IN clauses
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn uuid_values(ids: &[Uuid]) -> Vec<Value> {
    ids.iter().map(|id| (*id).into()).collect()
}

#[async_trait]
impl Store for Repository {
    async fn find_showtime(&self, id: Uuid) -> Result<Option<Showtime>> {
        ShowtimeEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_movie(&self, id: Uuid) -> Result<Option<Movie>> {
        MovieEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_hall(&self, id: Uuid) -> Result<Option<Hall>> {
        HallEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn list_available_seats(&self, hall_id: Uuid) -> Result<Vec<Seat>> {
        SeatEntity::find()
            .filter(SeatColumn::HallId.eq(hall_id))
            .filter(SeatColumn::Status.eq(String::from(SeatStatus::Available)))
            .order_by_asc(SeatColumn::Row)
            .order_by_asc(SeatColumn::Number)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn reserve_seats(&self, seat_ids: &[Uuid], hall_id: Uuid) -> Result<()> {
        if seat_ids.is_empty() {
            return Ok(());
        }

        // Fixed lock order keeps concurrent reservations deadlock-free.
        let mut ordered: Vec<Uuid> = seat_ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let txn = self.write_conn().begin().await?;

        let sql = format!(
            "SELECT id, hall_id, status FROM seats WHERE id IN ({}) ORDER BY id FOR UPDATE",
            placeholders(1, ordered.len()),
        );
        let rows = txn
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                uuid_values(&ordered),
            ))
            .await?;

        let mut found: HashSet<Uuid> = HashSet::new();
        let mut conflicts: Vec<Uuid> = Vec::new();

        for row in &rows {
            let id: Uuid = row.try_get("", "id")?;
            let seat_hall: Uuid = row.try_get("", "hall_id")?;
            let status: String = row.try_get("", "status")?;

            found.insert(id);

            if seat_hall != hall_id {
                txn.rollback().await?;
                return Err(AppError::Validation {
                    message: format!("seat {} does not belong to the showtime's hall", id),
                    field: Some("seat_ids".to_string()),
                });
            }

            if SeatStatus::from(status.as_str()) != SeatStatus::Available {
                conflicts.push(id);
            }
        }

        if let Some(missing) = ordered.iter().find(|id| !found.contains(id)) {
            txn.rollback().await?;
            return Err(AppError::SeatNotFound { id: *missing });
        }

        if !conflicts.is_empty() {
            txn.rollback().await?;
            return Err(AppError::SeatConflict { seat_ids: conflicts });
        }

        let sql = format!(
            "UPDATE seats SET status = 'RESERVED' WHERE id IN ({})",
            placeholders(1, ordered.len()),
        );
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            uuid_values(&ordered),
        ))
        .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn release_seats(&self, seat_ids: &[Uuid]) -> Result<()> {
        if seat_ids.is_empty() {
            return Ok(());
        }

        // Only RESERVED seats flip back; anything else is left untouched,
        // which makes release safe to repeat.
        let sql = format!(
            "UPDATE seats SET status = 'AVAILABLE' WHERE status = 'RESERVED' AND id IN ({})",
            placeholders(1, seat_ids.len()),
        );
        self.write_conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                uuid_values(seat_ids),
            ))
            .await?;

        Ok(())
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<BookingWithSeats> {
        let txn = self.write_conn().begin().await?;
        let now = chrono::Utc::now();

        let row = BookingActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(booking.user_id),
            showtime_id: Set(booking.showtime_id),
            total_seats: Set(booking.seat_ids.len() as i32),
            total_amount: Set(booking.total_amount),
            status: Set(booking.status.into()),
            created_at: Set(now.into()),
        };
        let inserted = row.insert(&txn).await?;

        let claims: Vec<BookingSeatActiveModel> = booking
            .seat_ids
            .iter()
            .map(|seat_id| BookingSeatActiveModel {
                booking_id: Set(inserted.id),
                seat_id: Set(*seat_id),
            })
            .collect();
        BookingSeatEntity::insert_many(claims).exec(&txn).await?;

        txn.commit().await?;

        Ok(BookingWithSeats {
            booking: inserted,
            seat_ids: booking.seat_ids,
        })
    }

    async fn booking_with_seats(&self, id: Uuid) -> Result<Option<BookingWithSeats>> {
        let Some(booking) = BookingEntity::find_by_id(id).one(self.read_conn()).await? else {
            return Ok(None);
        };

        let mut by_booking = self.seat_ids_by_booking(&[id]).await?;
        let seat_ids = by_booking.remove(&id).unwrap_or_default();

        Ok(Some(BookingWithSeats { booking, seat_ids }))
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<BookingWithSeats>> {
        let bookings = BookingEntity::find()
            .filter(BookingColumn::UserId.eq(user_id))
            .order_by_desc(BookingColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        let ids: Vec<Uuid> = bookings.iter().map(|b| b.id).collect();
        let mut by_booking = self.seat_ids_by_booking(&ids).await?;

        Ok(bookings
            .into_iter()
            .map(|booking| {
                let seat_ids = by_booking.remove(&booking.id).unwrap_or_default();
                BookingWithSeats { booking, seat_ids }
            })
            .collect())
    }

    async fn update_booking_seats(
        &self,
        id: Uuid,
        seat_ids: &[Uuid],
        total_amount: f64,
    ) -> Result<BookingWithSeats> {
        let txn = self.write_conn().begin().await?;

        // Conditional transition: a cancel that committed after the caller's
        // state check must not be resurrected to UPDATED here.
        let result = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE bookings \
                 SET total_seats = $2, total_amount = $3, status = 'UPDATED' \
                 WHERE id = $1 AND status IN ('PENDING', 'UPDATED')",
                vec![
                    id.into(),
                    (seat_ids.len() as i32).into(),
                    total_amount.into(),
                ],
            ))
            .await?;

        if result.rows_affected() == 0 {
            txn.rollback().await?;
            return match BookingEntity::find_by_id(id).one(self.read_conn()).await? {
                None => Err(AppError::BookingNotFound { id }),
                Some(row) => Err(AppError::Conflict {
                    message: format!("a {} booking cannot be reseated", row.status),
                }),
            };
        }

        BookingSeatEntity::delete_many()
            .filter(BookingSeatColumn::BookingId.eq(id))
            .exec(&txn)
            .await?;

        let claims: Vec<BookingSeatActiveModel> = seat_ids
            .iter()
            .map(|seat_id| BookingSeatActiveModel {
                booking_id: Set(id),
                seat_id: Set(*seat_id),
            })
            .collect();
        BookingSeatEntity::insert_many(claims).exec(&txn).await?;

        let updated = BookingEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(AppError::BookingNotFound { id })?;

        txn.commit().await?;

        Ok(BookingWithSeats {
            booking: updated,
            seat_ids: seat_ids.to_vec(),
        })
    }

    async fn set_booking_status(&self, id: Uuid, status: BookingStatus) -> Result<()> {
        let result = self
            .write_conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE bookings SET status = $1 WHERE id = $2",
                vec![String::from(status).into(), id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BookingNotFound { id });
        }

        Ok(())
    }

    async fn find_discount_code(&self, code: &str) -> Result<Option<DiscountCode>> {
        DiscountCodeEntity::find()
            .filter(DiscountCodeColumn::Code.eq(code))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn increment_code_usage(&self, code: &str) -> Result<bool> {
        let result = self
            .write_conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE discount_codes \
                 SET used_count = used_count + 1 \
                 WHERE code = $1 \
                   AND is_active \
                   AND (usage_limit IS NULL OR used_count < usage_limit)",
                vec![code.into()],
            ))
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn decrement_code_usage(&self, code: &str) -> Result<()> {
        self.write_conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE discount_codes \
                 SET used_count = used_count - 1 \
                 WHERE code = $1 AND used_count > 0",
                vec![code.into()],
            ))
            .await?;

        Ok(())
    }

    async fn insert_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode> {
        let row = DiscountCodeActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.code),
            description: Set(code.description),
            discount_type: Set(code.discount_type.into()),
            discount_value: Set(code.discount_value),
            min_purchase_amount: Set(code.min_purchase_amount),
            max_discount_amount: Set(code.max_discount_amount),
            usage_limit: Set(code.usage_limit),
            used_count: Set(0),
            valid_from: Set(code.valid_from.into()),
            valid_until: Set(code.valid_until.into()),
            is_active: Set(true),
        };

        row.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn active_discount_codes(&self) -> Result<Vec<DiscountCode>> {
        DiscountCodeEntity::find()
            .filter(DiscountCodeColumn::IsActive.eq(true))
            .order_by_desc(DiscountCodeColumn::ValidFrom)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn loyalty_account(&self, user_id: Uuid) -> Result<LoyaltyAccount> {
        // Lazy creation; the insert is a no-op when another writer got
        // there first.
        self.write_conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "INSERT INTO loyalty_accounts \
                     (id, user_id, points_balance, total_earned, total_redeemed, last_updated) \
                 VALUES ($1, $2, 0, 0, 0, NOW()) \
                 ON CONFLICT (user_id) DO NOTHING",
                vec![Uuid::new_v4().into(), user_id.into()],
            ))
            .await?;

        LoyaltyAccountEntity::find()
            .filter(LoyaltyAccountColumn::UserId.eq(user_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::Internal {
                message: format!("loyalty account missing for user {}", user_id),
            })
    }

    async fn credit_points(&self, user_id: Uuid, points: i64) -> Result<()> {
        self.write_conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "INSERT INTO loyalty_accounts \
                     (id, user_id, points_balance, total_earned, total_redeemed, last_updated) \
                 VALUES ($1, $2, $3, $3, 0, NOW()) \
                 ON CONFLICT (user_id) DO UPDATE SET \
                     points_balance = loyalty_accounts.points_balance + EXCLUDED.points_balance, \
                     total_earned = loyalty_accounts.total_earned + EXCLUDED.total_earned, \
                     last_updated = NOW()",
                vec![Uuid::new_v4().into(), user_id.into(), points.into()],
            ))
            .await?;

        Ok(())
    }

    async fn debit_points(&self, user_id: Uuid, points: i64) -> Result<bool> {
        let result = self
            .write_conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE loyalty_accounts \
                 SET points_balance = points_balance - $2, \
                     total_redeemed = total_redeemed + $2, \
                     last_updated = NOW() \
                 WHERE user_id = $1 AND points_balance >= $2",
                vec![user_id.into(), points.into()],
            ))
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn refund_points(&self, user_id: Uuid, points: i64) -> Result<()> {
        // Reverses a debit, so total_redeemed goes back down instead of
        // total_earned going up; lifetime totals keep matching history.
        let result = self
            .write_conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE loyalty_accounts \
                 SET points_balance = points_balance + $2, \
                     total_redeemed = total_redeemed - $2, \
                     last_updated = NOW() \
                 WHERE user_id = $1 AND total_redeemed >= $2",
                vec![user_id.into(), points.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Internal {
                message: format!("no matching debit to refund for user {}", user_id),
            });
        }

        Ok(())
    }
}
