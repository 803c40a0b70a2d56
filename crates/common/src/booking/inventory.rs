//! Seat availability and reservation

use crate::db::models::Seat;
use crate::errors::{AppError, Result};
use crate::store::Store;
use std::sync::Arc;
use uuid::Uuid;

/// Seat-level operations for a hall
pub struct SeatInventory<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for SeatInventory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> SeatInventory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// All AVAILABLE seats of a hall, ordered by row then number
    pub async fn list_available(&self, hall_id: Uuid) -> Result<Vec<Seat>> {
        self.store.list_available_seats(hall_id).await
    }

    /// Atomically reserve every seat, or none of them.
    ///
    /// A conflict on any seat fails the whole batch and names the
    /// offending seat ids.
    pub async fn reserve(&self, seat_ids: &[Uuid], hall_id: Uuid) -> Result<()> {
        match self.store.reserve_seats(seat_ids, hall_id).await {
            Ok(()) => {
                tracing::debug!(count = seat_ids.len(), hall_id = %hall_id, "Seats reserved");
                Ok(())
            }
            Err(err) => {
                if let AppError::SeatConflict { seat_ids } = &err {
                    crate::metrics::record_seat_conflict(seat_ids.len());
                }
                Err(err)
            }
        }
    }

    /// Return seats to the available pool. Safe to call more than once;
    /// seats that are not RESERVED are left untouched.
    pub async fn release(&self, seat_ids: &[Uuid]) -> Result<()> {
        if seat_ids.is_empty() {
            return Ok(());
        }

        self.store.release_seats(seat_ids).await?;
        tracing::debug!(count = seat_ids.len(), "Seats released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SeatStatus;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_reserve_then_release_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let hall = Uuid::new_v4();
        let a = store.add_seat(hall, "A", 1);
        let b = store.add_seat(hall, "A", 2);

        let inventory = SeatInventory::new(Arc::clone(&store));
        inventory.reserve(&[a, b], hall).await.unwrap();
        assert_eq!(store.seat_status(a), Some(SeatStatus::Reserved));

        inventory.release(&[a, b]).await.unwrap();
        assert_eq!(store.seat_status(a), Some(SeatStatus::Available));
        assert_eq!(store.seat_status(b), Some(SeatStatus::Available));
    }

    #[tokio::test]
    async fn test_conflict_names_taken_seats() {
        let store = Arc::new(MemoryStore::new());
        let hall = Uuid::new_v4();
        let a = store.add_seat(hall, "A", 1);
        let b = store.add_seat_with_status(hall, "A", 2, SeatStatus::Occupied);

        let inventory = SeatInventory::new(Arc::clone(&store));
        let err = inventory.reserve(&[a, b], hall).await.unwrap_err();

        match err {
            AppError::SeatConflict { seat_ids } => assert_eq!(seat_ids, vec![b]),
            other => panic!("expected seat conflict, got {:?}", other),
        }
        // Losing batch left the available seat untouched
        assert_eq!(store.seat_status(a), Some(SeatStatus::Available));
    }
}
