use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::{ManagerError, StorageError},
    models::{Availability, Hotel, RecordId},
    storage::{CollectionStore, IdStrategy, JsonFileStore, Repository},
    update::{HotelUpdate, UpdatePolicy},
};

/// Hotels and the room bookings embedded in them.
///
/// A room is either available or reserved. [`HotelManager::book_room`] moves
/// one room to reserved when capacity allows and
/// [`HotelManager::cancel_reservation`] moves it back.
pub struct HotelManager {
    repo: Repository<Hotel>,
    update_policy: UpdatePolicy,
}

impl HotelManager {
    /// Open the hotel collection configured in `config`.
    pub fn open(config: &AppConfig) -> Result<Self, StorageError> {
        let store = JsonFileStore::open(config.hotels_path(), config.atomic_writes)?
            .with_sequence(config.id_strategy == IdStrategy::Sequence);
        Ok(Self::with_store(store, config.id_strategy, config.update_policy))
    }

    /// Build a manager over any backend.
    pub fn with_store(
        store: impl CollectionStore<Hotel> + 'static,
        id_strategy: IdStrategy,
        update_policy: UpdatePolicy,
    ) -> Self {
        Self {
            repo: Repository::new(store, id_strategy),
            update_policy,
        }
    }

    /// Add a hotel with no reservations.
    pub fn create(&self, name: &str, room_count: u32) -> Result<Hotel, StorageError> {
        let hotel = self
            .repo
            .insert_with(|id| Hotel::new(id, name, room_count))?;
        info!(id = hotel.id, rooms = room_count, "Hotel '{}' created", hotel.name);
        Ok(hotel)
    }

    /// Remove a hotel. Missing ids are not an error; the return value tells
    /// whether anything was removed.
    pub fn delete(&self, id: RecordId) -> Result<bool, StorageError> {
        let removed = self.repo.remove(id)?;
        info!(id, removed, "Hotel deleted");
        Ok(removed)
    }

    /// The hotel with the given id.
    pub fn get(&self, id: RecordId) -> Result<Hotel, ManagerError> {
        self.repo.get(id)
    }

    /// Every hotel in stored order.
    pub fn list(&self) -> Result<Vec<Hotel>, StorageError> {
        self.repo.all()
    }

    /// Apply a partial update according to the configured policy.
    pub fn update(&self, id: RecordId, update: HotelUpdate) -> Result<Hotel, ManagerError> {
        let policy = self.update_policy;
        let result = self.repo.modify(id, |hotel| {
            if let Some(room_count) = policy.number(update.room_count) {
                let reserved = hotel.reserved_rooms();
                if (room_count as usize) < reserved {
                    return Err(ManagerError::CapacityBelowReservations {
                        hotel_id: hotel.id,
                        requested: room_count,
                        reserved,
                    });
                }
                hotel.room_count = room_count;
            }
            if let Some(name) = policy.text(update.name.as_deref()) {
                hotel.name = name;
            }
            Ok(hotel.clone())
        });
        match &result {
            Ok(hotel) => info!(id, "Hotel '{}' updated", hotel.name),
            Err(err) => warn!(id, "Hotel update rejected: {err}"),
        }
        result
    }

    /// Reserve one room of `hotel_id` for `customer_id`.
    ///
    /// Fails with [`ManagerError::CapacityExhausted`] when every room is
    /// taken. The same customer may hold several rooms.
    pub fn book_room(
        &self,
        hotel_id: RecordId,
        customer_id: RecordId,
    ) -> Result<Availability, ManagerError> {
        let result = self.repo.modify(hotel_id, |hotel| {
            if hotel.reserve(customer_id) {
                Ok(hotel.availability())
            } else {
                Err(ManagerError::CapacityExhausted {
                    hotel_id,
                    room_count: hotel.room_count,
                })
            }
        });
        match &result {
            Ok(availability) => info!(
                hotel_id,
                customer_id,
                available = availability.available,
                "Room reserved"
            ),
            Err(err) => warn!(hotel_id, customer_id, "Booking refused: {err}"),
        }
        result
    }

    /// Release the first room `customer_id` holds in `hotel_id`.
    pub fn cancel_reservation(
        &self,
        hotel_id: RecordId,
        customer_id: RecordId,
    ) -> Result<Availability, ManagerError> {
        let result = self.repo.modify(hotel_id, |hotel| {
            if hotel.release(customer_id) {
                Ok(hotel.availability())
            } else {
                Err(ManagerError::ReservationMissing {
                    hotel_id,
                    customer_id,
                })
            }
        });
        match &result {
            Ok(availability) => info!(
                hotel_id,
                customer_id,
                available = availability.available,
                "Reservation cancelled"
            ),
            Err(err) => warn!(hotel_id, customer_id, "Cancellation refused: {err}"),
        }
        result
    }

    /// Undo the latest [`HotelManager::book_room`] for `customer_id`, leaving
    /// earlier bookings in place and in order.
    pub(crate) fn revert_booking(
        &self,
        hotel_id: RecordId,
        customer_id: RecordId,
    ) -> Result<Availability, ManagerError> {
        self.repo.modify(hotel_id, |hotel| {
            if hotel.release_last(customer_id) {
                Ok(hotel.availability())
            } else {
                Err(ManagerError::ReservationMissing {
                    hotel_id,
                    customer_id,
                })
            }
        })
    }

    /// Capacity figures for a hotel.
    pub fn availability(&self, hotel_id: RecordId) -> Result<Availability, ManagerError> {
        Ok(self.get(hotel_id)?.availability())
    }
}
