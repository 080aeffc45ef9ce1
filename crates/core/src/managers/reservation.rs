use tracing::info;

use crate::{
    config::AppConfig,
    error::{ManagerError, StorageError},
    models::{RecordId, Reservation},
    storage::{CollectionStore, IdStrategy, JsonFileStore, Repository},
};

/// Standalone reservation records.
///
/// Records are not validated against the hotel or customer collections and
/// adding one does not consume hotel capacity; [`crate::Ledger`] pairs the
/// two when that is wanted.
pub struct ReservationManager {
    repo: Repository<Reservation>,
}

impl ReservationManager {
    /// Open the reservation collection configured in `config`.
    pub fn open(config: &AppConfig) -> Result<Self, StorageError> {
        let store = JsonFileStore::open(config.reservations_path(), config.atomic_writes)?
            .with_sequence(config.id_strategy == IdStrategy::Sequence);
        Ok(Self::with_store(store, config.id_strategy))
    }

    /// Build a manager over any backend.
    pub fn with_store(
        store: impl CollectionStore<Reservation> + 'static,
        id_strategy: IdStrategy,
    ) -> Self {
        Self {
            repo: Repository::new(store, id_strategy),
        }
    }

    /// Record a booking without touching hotel capacity.
    pub fn add(
        &self,
        customer_id: RecordId,
        hotel_id: RecordId,
    ) -> Result<Reservation, StorageError> {
        let reservation = self.repo.insert_with(|id| Reservation {
            id,
            customer_id,
            hotel_id,
        })?;
        info!(id = reservation.id, customer_id, hotel_id, "Reservation added");
        Ok(reservation)
    }

    /// Remove a reservation; missing ids are silently accepted.
    pub fn delete(&self, id: RecordId) -> Result<bool, StorageError> {
        let removed = self.repo.remove(id)?;
        info!(id, removed, "Reservation deleted");
        Ok(removed)
    }

    /// The reservation with the given id.
    pub fn get(&self, id: RecordId) -> Result<Reservation, ManagerError> {
        self.repo.get(id)
    }

    /// All reservations in stored order.
    pub fn list(&self) -> Result<Vec<Reservation>, StorageError> {
        self.repo.all()
    }

    /// Remove the oldest record for the pair, if there is one.
    pub fn remove_first_matching(
        &self,
        customer_id: RecordId,
        hotel_id: RecordId,
    ) -> Result<Option<Reservation>, StorageError> {
        let removed = self.repo.remove_first(|reservation| {
            reservation.customer_id == customer_id && reservation.hotel_id == hotel_id
        })?;
        if let Some(reservation) = &removed {
            info!(id = reservation.id, customer_id, hotel_id, "Reservation removed");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use anyhow::Result;

    fn manager(strategy: IdStrategy) -> (ReservationManager, MemoryStore<Reservation>) {
        let store = MemoryStore::new();
        (ReservationManager::with_store(store.clone(), strategy), store)
    }

    #[test]
    fn add_assigns_ids() -> Result<()> {
        let (reservations, store) = manager(IdStrategy::Sequence);
        reservations.add(1, 1)?;
        assert_eq!(
            store.snapshot(),
            vec![Reservation {
                id: 1,
                customer_id: 1,
                hotel_id: 1
            }]
        );
        Ok(())
    }

    #[test]
    fn add_does_not_check_references() -> Result<()> {
        let (reservations, _) = manager(IdStrategy::Sequence);
        let added = reservations.add(404, 500)?;
        assert_eq!(reservations.get(added.id)?, added);
        Ok(())
    }

    #[test]
    fn delete_and_missing_delete() -> Result<()> {
        let (reservations, store) = manager(IdStrategy::Sequence);
        reservations.add(1, 1)?;
        assert!(!reservations.delete(9)?);
        assert_eq!(store.snapshot().len(), 1);
        assert!(reservations.delete(1)?);
        assert!(store.snapshot().is_empty());
        Ok(())
    }

    #[test]
    fn missing_reservation_is_reported() {
        let (reservations, _) = manager(IdStrategy::Sequence);
        assert_eq!(reservations.get(6).unwrap_err().missing_id(), Some(6));
    }

    #[test]
    fn legacy_numbering_can_repeat_ids() -> Result<()> {
        let (reservations, _) = manager(IdStrategy::CountPlusOne);
        reservations.add(1, 1)?;
        reservations.add(2, 1)?;
        reservations.delete(1)?;
        let next = reservations.add(3, 1)?;
        assert_eq!(next.id, 2);
        assert_eq!(reservations.list()?.iter().filter(|r| r.id == 2).count(), 2);
        Ok(())
    }

    #[test]
    fn remove_first_matching_takes_oldest() -> Result<()> {
        let (reservations, _) = manager(IdStrategy::Sequence);
        reservations.add(1, 2)?;
        reservations.add(1, 2)?;
        let removed = reservations.remove_first_matching(1, 2)?;
        assert_eq!(removed.map(|r| r.id), Some(1));
        assert!(reservations.remove_first_matching(9, 9)?.is_none());
        assert_eq!(reservations.list()?.len(), 1);
        Ok(())
    }
}
