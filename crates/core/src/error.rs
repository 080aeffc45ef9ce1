//! Error taxonomy shared by the storage layer and the managers.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::models::{RecordId, RecordKind};

/// Failure to read, decode, encode or write a backing resource.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The resource could not be read or created.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Resource location.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The resource could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Resource location.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The resource does not hold a valid record sequence.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// Resource location.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// Records could not be encoded for writing.
    #[error("failed to encode data for {}: {source}", path.display())]
    Encode {
        /// Resource location.
        path: PathBuf,
        /// Encoder error.
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of a manager operation that did not succeed.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No record with the requested id.
    #[error("no {kind} found with id {id}")]
    NotFound {
        /// Collection that was searched.
        kind: RecordKind,
        /// Requested id.
        id: RecordId,
    },
    /// Every room of the hotel is already reserved.
    #[error("hotel {hotel_id} has no available rooms ({room_count} total)")]
    CapacityExhausted {
        /// Hotel that was asked for a room.
        hotel_id: RecordId,
        /// Its total room count.
        room_count: u32,
    },
    /// Cancellation for a customer that holds no room in the hotel.
    #[error("hotel {hotel_id} has no reservation for customer {customer_id}")]
    ReservationMissing {
        /// Hotel searched.
        hotel_id: RecordId,
        /// Customer without a reservation.
        customer_id: RecordId,
    },
    /// A room-count update would drop below the rooms already reserved.
    #[error("hotel {hotel_id} cannot shrink to {requested} rooms while {reserved} are reserved")]
    CapacityBelowReservations {
        /// Hotel being updated.
        hotel_id: RecordId,
        /// Requested room count.
        requested: u32,
        /// Rooms currently reserved.
        reserved: usize,
    },
    /// The backing resource failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ManagerError {
    /// Build a not-found error for a record kind.
    pub fn not_found(kind: RecordKind, id: RecordId) -> Self {
        ManagerError::NotFound { kind, id }
    }

    /// The missing id, when this is a not-found report.
    pub fn missing_id(&self) -> Option<RecordId> {
        match self {
            ManagerError::NotFound { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Whether the error came from the storage layer rather than a rule.
    pub fn is_storage(&self) -> bool {
        matches!(self, ManagerError::Storage(_))
    }
}
