#![warn(clippy::all, missing_docs)]

//! Core domain logic for the hoteldesk administration tool.
//!
//! This crate hosts the hotel, customer and reservation models, the JSON
//! collection storage they persist to, the managers that operate on each
//! collection, configuration handling, and the file watcher used by the
//! terminal console.

pub mod config;
pub mod error;
pub mod ledger;
pub mod managers;
pub mod manifest;
pub mod models;
pub mod storage;
pub mod update;
pub mod watch;

pub use config::AppConfig;
pub use error::{ManagerError, StorageError};
pub use ledger::{BookedGuest, CustomerBooking, HotelBookings, Ledger, LedgerDrift};
pub use managers::{CustomerManager, HotelManager, ReservationManager};
pub use models::{
    Availability, Customer, Hotel, RecordId, RecordKind, Reservation, ReservationStub,
};
pub use storage::{IdStrategy, JsonFileStore, MemoryStore};
pub use update::{CustomerUpdate, HotelUpdate, UpdatePolicy};
pub use watch::{DataEvent, DataWatcher};
