//! One manager per persisted collection.

mod customer;
mod hotel;
mod reservation;

pub use customer::CustomerManager;
pub use hotel::HotelManager;
pub use reservation::ReservationManager;
