//! Shared domain models.
//!
//! Field names on disk follow the layout of the existing data files
//! (`nombre`, `habitaciones`, `reservas`, ...), so every struct renames its
//! fields explicitly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::Record;

/// Identifier shared by all three collections.
pub type RecordId = u32;

/// The kind of record a collection holds, used in reports and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Hotel records.
    Hotel,
    /// Customer records.
    Customer,
    /// Standalone reservation records.
    Reservation,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::Hotel => "hotel",
            RecordKind::Customer => "customer",
            RecordKind::Reservation => "reservation",
        };
        f.write_str(label)
    }
}

/// Minimal booking entry embedded in a hotel; occupies one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationStub {
    /// Customer holding the room.
    #[serde(rename = "id_cliente")]
    pub customer_id: RecordId,
}

/// A hotel together with its embedded reservation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotel {
    /// Identifier within the hotel collection.
    pub id: RecordId,
    /// Display name.
    #[serde(rename = "nombre")]
    pub name: String,
    /// Number of bookable rooms.
    #[serde(rename = "habitaciones")]
    pub room_count: u32,
    /// Rooms currently held, one stub per room.
    #[serde(rename = "reservas", default)]
    pub reservations: Vec<ReservationStub>,
}

impl Hotel {
    /// Build a hotel with no reservations.
    pub fn new(id: RecordId, name: impl Into<String>, room_count: u32) -> Self {
        Self {
            id,
            name: name.into(),
            room_count,
            reservations: Vec::new(),
        }
    }

    /// Number of rooms held by reservation stubs.
    pub fn reserved_rooms(&self) -> usize {
        self.reservations.len()
    }

    /// Rooms still free. Saturates at zero for data that is already overbooked.
    pub fn available_rooms(&self) -> u32 {
        let reserved = u32::try_from(self.reservations.len()).unwrap_or(u32::MAX);
        self.room_count.saturating_sub(reserved)
    }

    /// Snapshot of the capacity figures.
    pub fn availability(&self) -> Availability {
        Availability {
            room_count: self.room_count,
            reserved: self.reserved_rooms(),
            available: self.available_rooms(),
        }
    }

    /// Move one room from available to reserved for `customer_id`.
    ///
    /// Returns `false` and leaves the hotel untouched when no room is free.
    pub fn reserve(&mut self, customer_id: RecordId) -> bool {
        if self.available_rooms() == 0 {
            return false;
        }
        self.reservations.push(ReservationStub { customer_id });
        true
    }

    /// Release the first room held by `customer_id`.
    pub fn release(&mut self, customer_id: RecordId) -> bool {
        match self
            .reservations
            .iter()
            .position(|stub| stub.customer_id == customer_id)
        {
            Some(index) => {
                self.reservations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Release the most recent room held by `customer_id`, undoing the last
    /// [`Hotel::reserve`] for that customer.
    pub fn release_last(&mut self, customer_id: RecordId) -> bool {
        match self
            .reservations
            .iter()
            .rposition(|stub| stub.customer_id == customer_id)
        {
            Some(index) => {
                self.reservations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of rooms held by `customer_id`.
    pub fn rooms_held_by(&self, customer_id: RecordId) -> usize {
        self.reservations
            .iter()
            .filter(|stub| stub.customer_id == customer_id)
            .count()
    }
}

impl Record for Hotel {
    const KIND: RecordKind = RecordKind::Hotel;

    fn id(&self) -> RecordId {
        self.id
    }
}

/// Capacity figures for a single hotel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    /// Total rooms.
    pub room_count: u32,
    /// Rooms held by reservation stubs.
    pub reserved: usize,
    /// Rooms still bookable.
    pub available: u32,
}

/// A customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Identifier within the customer collection.
    pub id: RecordId,
    /// Display name.
    #[serde(rename = "nombre")]
    pub name: String,
    /// Age in years.
    #[serde(rename = "edad")]
    pub age: u32,
}

impl Record for Customer {
    const KIND: RecordKind = RecordKind::Customer;

    fn id(&self) -> RecordId {
        self.id
    }
}

/// Standalone reservation record linking a customer to a hotel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Identifier within the reservation collection.
    pub id: RecordId,
    /// Customer that booked.
    #[serde(rename = "id_cliente")]
    pub customer_id: RecordId,
    /// Hotel that was booked.
    #[serde(rename = "id_hotel")]
    pub hotel_id: RecordId,
}

impl Record for Reservation {
    const KIND: RecordKind = RecordKind::Reservation;

    fn id(&self) -> RecordId {
        self.id
    }
}
