//! Bookings seen across all three collections.
//!
//! Hotels carry their own reservation stubs while the reservation collection
//! keeps standalone records; neither updates the other. [`Ledger`] books and
//! cancels through both and offers read views keyed by hotel or by customer,
//! plus a report of pairs where the two sides disagree.

use std::collections::BTreeMap;

use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    error::{ManagerError, StorageError},
    managers::{CustomerManager, HotelManager, ReservationManager},
    models::{Customer, Hotel, RecordId, Reservation},
};

/// A customer holding rooms in a hotel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedGuest {
    /// Customer id from the reservation stubs.
    pub customer_id: RecordId,
    /// The customer record, when it still exists.
    pub customer: Option<Customer>,
    /// Rooms held.
    pub rooms: usize,
}

/// Everything booked in one hotel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotelBookings {
    /// The hotel itself.
    pub hotel: Hotel,
    /// Guests in the order they first booked.
    pub guests: Vec<BookedGuest>,
    /// Standalone records pointing at this hotel.
    pub records: Vec<Reservation>,
}

/// One hotel a customer has bookings in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerBooking {
    /// Hotel id.
    pub hotel_id: RecordId,
    /// Hotel name, when the hotel still exists.
    pub hotel_name: Option<String>,
    /// Rooms held according to the hotel.
    pub rooms: usize,
    /// Ids of standalone records for the pair.
    pub records: Vec<RecordId>,
}

/// A hotel/customer pair whose room count and record count differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerDrift {
    /// Hotel id.
    pub hotel_id: RecordId,
    /// Customer id.
    pub customer_id: RecordId,
    /// Rooms held according to the hotel.
    pub rooms: usize,
    /// Standalone records for the pair.
    pub records: usize,
}

/// The three managers bundled together.
pub struct Ledger {
    hotels: HotelManager,
    customers: CustomerManager,
    reservations: ReservationManager,
}

impl Ledger {
    /// Open every collection configured in `config`.
    pub fn open(config: &AppConfig) -> Result<Self, StorageError> {
        Ok(Self::new(
            HotelManager::open(config)?,
            CustomerManager::open(config)?,
            ReservationManager::open(config)?,
        ))
    }

    /// Bundle existing managers.
    pub fn new(
        hotels: HotelManager,
        customers: CustomerManager,
        reservations: ReservationManager,
    ) -> Self {
        Self {
            hotels,
            customers,
            reservations,
        }
    }

    /// Hotel manager.
    pub fn hotels(&self) -> &HotelManager {
        &self.hotels
    }

    /// Customer manager.
    pub fn customers(&self) -> &CustomerManager {
        &self.customers
    }

    /// Reservation manager.
    pub fn reservations(&self) -> &ReservationManager {
        &self.reservations
    }

    /// Reserve a room and record the booking as a standalone reservation.
    ///
    /// When the record cannot be written the room is released again before
    /// the storage error is returned.
    pub fn book(
        &self,
        hotel_id: RecordId,
        customer_id: RecordId,
    ) -> Result<Reservation, ManagerError> {
        self.hotels.book_room(hotel_id, customer_id)?;
        match self.reservations.add(customer_id, hotel_id) {
            Ok(reservation) => {
                info!(hotel_id, customer_id, id = reservation.id, "Booking recorded");
                Ok(reservation)
            }
            Err(err) => {
                warn!(hotel_id, customer_id, "Releasing room after failed record: {err}");
                if let Err(undo) = self.hotels.revert_booking(hotel_id, customer_id) {
                    error!(hotel_id, customer_id, "Failed to release room: {undo}");
                }
                Err(err.into())
            }
        }
    }

    /// Release a room and drop the oldest matching standalone record.
    ///
    /// Returns the removed record; `None` when the hotel held a room with no
    /// record behind it.
    pub fn cancel(
        &self,
        hotel_id: RecordId,
        customer_id: RecordId,
    ) -> Result<Option<Reservation>, ManagerError> {
        self.hotels.cancel_reservation(hotel_id, customer_id)?;
        let removed = self
            .reservations
            .remove_first_matching(customer_id, hotel_id)?;
        if removed.is_none() {
            warn!(hotel_id, customer_id, "Cancelled room had no standalone record");
        }
        Ok(removed)
    }

    /// Bookings of one hotel.
    pub fn by_hotel(&self, hotel_id: RecordId) -> Result<HotelBookings, ManagerError> {
        let hotel = self.hotels.get(hotel_id)?;
        let customers = self.customers.list()?;
        let records = self
            .reservations
            .list()?
            .into_iter()
            .filter(|reservation| reservation.hotel_id == hotel_id)
            .collect();

        let mut guests: Vec<BookedGuest> = Vec::new();
        for stub in &hotel.reservations {
            match guests
                .iter_mut()
                .find(|guest| guest.customer_id == stub.customer_id)
            {
                Some(guest) => guest.rooms += 1,
                None => guests.push(BookedGuest {
                    customer_id: stub.customer_id,
                    customer: customers
                        .iter()
                        .find(|customer| customer.id == stub.customer_id)
                        .cloned(),
                    rooms: 1,
                }),
            }
        }

        Ok(HotelBookings {
            hotel,
            guests,
            records,
        })
    }

    /// Hotels a customer has bookings in, ordered by hotel id.
    pub fn by_customer(&self, customer_id: RecordId) -> Result<Vec<CustomerBooking>, StorageError> {
        let hotels = self.hotels.list()?;
        let reservations = self.reservations.list()?;

        let mut bookings: BTreeMap<RecordId, CustomerBooking> = BTreeMap::new();
        for hotel in &hotels {
            let rooms = hotel.rooms_held_by(customer_id);
            if rooms > 0 {
                bookings.insert(
                    hotel.id,
                    CustomerBooking {
                        hotel_id: hotel.id,
                        hotel_name: Some(hotel.name.clone()),
                        rooms,
                        records: Vec::new(),
                    },
                );
            }
        }
        for reservation in reservations
            .iter()
            .filter(|reservation| reservation.customer_id == customer_id)
        {
            bookings
                .entry(reservation.hotel_id)
                .or_insert_with(|| CustomerBooking {
                    hotel_id: reservation.hotel_id,
                    hotel_name: hotels
                        .iter()
                        .find(|hotel| hotel.id == reservation.hotel_id)
                        .map(|hotel| hotel.name.clone()),
                    rooms: 0,
                    records: Vec::new(),
                })
                .records
                .push(reservation.id);
        }

        Ok(bookings.into_values().collect())
    }

    /// Pairs where the hotel's rooms and the standalone records disagree.
    pub fn reconcile(&self) -> Result<Vec<LedgerDrift>, StorageError> {
        let mut counts: BTreeMap<(RecordId, RecordId), (usize, usize)> = BTreeMap::new();
        for hotel in self.hotels.list()? {
            for stub in &hotel.reservations {
                counts.entry((hotel.id, stub.customer_id)).or_default().0 += 1;
            }
        }
        for reservation in self.reservations.list()? {
            counts
                .entry((reservation.hotel_id, reservation.customer_id))
                .or_default()
                .1 += 1;
        }

        Ok(counts
            .into_iter()
            .filter(|(_, (rooms, records))| rooms != records)
            .map(|((hotel_id, customer_id), (rooms, records))| LedgerDrift {
                hotel_id,
                customer_id,
                rooms,
                records,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::{Collection, CollectionStore, IdStrategy, MemoryStore},
        update::UpdatePolicy,
    };
    use anyhow::Result;
    use std::io;
    use tempfile::tempdir;

    struct ReadOnlyStore;

    impl CollectionStore<Reservation> for ReadOnlyStore {
        fn load(&self) -> Result<Collection<Reservation>, StorageError> {
            Ok(Collection::empty())
        }

        fn save(&self, _: &Collection<Reservation>) -> Result<(), StorageError> {
            Err(StorageError::Write {
                path: "reservaciones.json".into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read only"),
            })
        }

        fn location(&self) -> String {
            "read-only".to_string()
        }
    }

    struct Fixture {
        ledger: Ledger,
        hotels: MemoryStore<Hotel>,
        reservations: MemoryStore<Reservation>,
    }

    fn fixture() -> Fixture {
        let hotels = MemoryStore::new();
        let reservations = MemoryStore::new();
        let ledger = Ledger::new(
            HotelManager::with_store(hotels.clone(), IdStrategy::Sequence, UpdatePolicy::IgnoreEmpty),
            CustomerManager::with_store(
                MemoryStore::new(),
                IdStrategy::Sequence,
                UpdatePolicy::IgnoreEmpty,
            ),
            ReservationManager::with_store(reservations.clone(), IdStrategy::Sequence),
        );
        Fixture {
            ledger,
            hotels,
            reservations,
        }
    }

    #[test]
    fn book_writes_both_sides() -> Result<()> {
        let fx = fixture();
        fx.ledger.hotels().create("Grand Hotel Budapest", 2)?;
        fx.ledger.customers().add("Dante", 31)?;
        let reservation = fx.ledger.book(1, 1)?;
        assert_eq!((reservation.hotel_id, reservation.customer_id), (1, 1));
        assert_eq!(fx.hotels.snapshot()[0].reserved_rooms(), 1);
        assert_eq!(fx.reservations.snapshot(), vec![reservation]);
        assert!(fx.ledger.reconcile()?.is_empty());
        Ok(())
    }

    #[test]
    fn refused_booking_writes_nothing() -> Result<()> {
        let fx = fixture();
        fx.ledger.hotels().create("Full", 0)?;
        assert!(matches!(
            fx.ledger.book(1, 1),
            Err(ManagerError::CapacityExhausted { .. })
        ));
        assert!(fx.reservations.snapshot().is_empty());
        Ok(())
    }

    #[test]
    fn failed_record_releases_room() -> Result<()> {
        let hotels = MemoryStore::new();
        let ledger = Ledger::new(
            HotelManager::with_store(hotels.clone(), IdStrategy::Sequence, UpdatePolicy::IgnoreEmpty),
            CustomerManager::with_store(
                MemoryStore::new(),
                IdStrategy::Sequence,
                UpdatePolicy::IgnoreEmpty,
            ),
            ReservationManager::with_store(ReadOnlyStore, IdStrategy::Sequence),
        );
        ledger.hotels().create("Budapest", 1)?;
        assert!(ledger.book(1, 1).unwrap_err().is_storage());
        assert!(hotels.snapshot()[0].reservations.is_empty());
        Ok(())
    }

    #[test]
    fn failed_record_keeps_earlier_rooms_in_order() -> Result<()> {
        let hotels = MemoryStore::with_records(vec![Hotel::new(1, "Budapest", 5)]);
        let seeded = HotelManager::with_store(
            hotels.clone(),
            IdStrategy::Sequence,
            UpdatePolicy::IgnoreEmpty,
        );
        seeded.book_room(1, 1)?;
        seeded.book_room(1, 2)?;

        let ledger = Ledger::new(
            seeded,
            CustomerManager::with_store(
                MemoryStore::new(),
                IdStrategy::Sequence,
                UpdatePolicy::IgnoreEmpty,
            ),
            ReservationManager::with_store(ReadOnlyStore, IdStrategy::Sequence),
        );
        assert!(ledger.book(1, 1).unwrap_err().is_storage());
        let holders: Vec<RecordId> = hotels.snapshot()[0]
            .reservations
            .iter()
            .map(|stub| stub.customer_id)
            .collect();
        assert_eq!(holders, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn unwritable_manifest_keeps_ledgers_in_step() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            atomic_writes: false,
            ..AppConfig::default()
        };
        std::fs::create_dir(crate::manifest::manifest_path(config.reservations_path()))?;
        let ledger = Ledger::open(&config)?;
        ledger.hotels().create("Budapest", 2)?;
        ledger.customers().add("Dante", 31)?;

        let reservation = ledger.book(1, 1)?;
        assert_eq!((reservation.hotel_id, reservation.customer_id), (1, 1));
        assert_eq!(ledger.hotels().get(1)?.reserved_rooms(), 1);
        assert_eq!(ledger.reservations().list()?, vec![reservation]);
        assert!(ledger.reconcile()?.is_empty());
        Ok(())
    }

    #[test]
    fn cancel_releases_room_and_record() -> Result<()> {
        let fx = fixture();
        fx.ledger.hotels().create("Grand Hotel Budapest", 2)?;
        let booked = fx.ledger.book(1, 1)?;
        assert_eq!(fx.ledger.cancel(1, 1)?, Some(booked));
        assert!(fx.hotels.snapshot()[0].reservations.is_empty());
        assert!(fx.reservations.snapshot().is_empty());
        Ok(())
    }

    #[test]
    fn cancel_without_room_is_reported() -> Result<()> {
        let fx = fixture();
        fx.ledger.hotels().create("Grand Hotel Budapest", 2)?;
        fx.ledger.reservations().add(1, 1)?;
        assert!(matches!(
            fx.ledger.cancel(1, 1),
            Err(ManagerError::ReservationMissing { .. })
        ));
        assert_eq!(fx.reservations.snapshot().len(), 1);
        Ok(())
    }

    #[test]
    fn views_group_by_hotel_and_customer() -> Result<()> {
        let fx = fixture();
        fx.ledger.hotels().create("Budapest", 5)?;
        fx.ledger.hotels().create("California", 5)?;
        fx.ledger.customers().add("Dante", 31)?;
        fx.ledger.book(1, 1)?;
        fx.ledger.book(1, 1)?;
        fx.ledger.book(1, 7)?;
        fx.ledger.book(2, 1)?;

        let budapest = fx.ledger.by_hotel(1)?;
        assert_eq!(budapest.guests.len(), 2);
        assert_eq!(budapest.guests[0].rooms, 2);
        assert_eq!(
            budapest.guests[0].customer.as_ref().map(|c| c.name.as_str()),
            Some("Dante")
        );
        assert!(budapest.guests[1].customer.is_none());
        assert_eq!(budapest.records.len(), 3);

        let dante = fx.ledger.by_customer(1)?;
        assert_eq!(dante.len(), 2);
        assert_eq!(dante[0].hotel_id, 1);
        assert_eq!(dante[0].rooms, 2);
        assert_eq!(dante[0].records.len(), 2);
        assert_eq!(dante[1].hotel_name.as_deref(), Some("California"));
        Ok(())
    }

    #[test]
    fn by_hotel_reports_missing_hotel() {
        let fx = fixture();
        assert_eq!(fx.ledger.by_hotel(3).unwrap_err().missing_id(), Some(3));
    }

    #[test]
    fn reconcile_spots_independent_writes() -> Result<()> {
        let fx = fixture();
        fx.ledger.hotels().create("Budapest", 5)?;
        fx.ledger.hotels().book_room(1, 1)?;
        fx.ledger.reservations().add(2, 1)?;

        let drift = fx.ledger.reconcile()?;
        assert_eq!(
            drift,
            vec![
                LedgerDrift {
                    hotel_id: 1,
                    customer_id: 1,
                    rooms: 1,
                    records: 0
                },
                LedgerDrift {
                    hotel_id: 1,
                    customer_id: 2,
                    rooms: 0,
                    records: 1
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn opens_all_collections_from_config() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig {
            data_dir: dir.path().join("data"),
            ..AppConfig::default()
        };
        let ledger = Ledger::open(&config)?;
        for path in config.data_paths() {
            assert!(path.exists(), "{} missing", path.display());
        }
        ledger.hotels().create("Budapest", 1)?;
        ledger.customers().add("Dante", 31)?;
        ledger.book(1, 1)?;
        assert!(matches!(
            ledger.book(1, 1),
            Err(ManagerError::CapacityExhausted { .. })
        ));
        assert_eq!(ledger.reservations().list()?.len(), 1);
        Ok(())
    }
}
