//! crates/booking_core/src/error.rs
//!
//! Error taxonomy of the availability engine. Each variant names the operation
//! that failed so the caller can turn it into a user-visible message.

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::domain::BookingStatus;
use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The page was opened without a business identifier. Nothing else can run.
    #[error("No business identifier was provided")]
    MissingBusiness,

    #[error("Business configuration unavailable: {0}")]
    ConfigUnavailable(#[source] PortError),

    #[error("Business hours are invalid: opening {opening} is not before closing {closing}")]
    InvalidHours { opening: NaiveTime, closing: NaiveTime },

    #[error("Service list unavailable: {0}")]
    ServiceListUnavailable(#[source] PortError),

    #[error("Unknown service '{0}'")]
    UnknownService(String),

    #[error("Service '{0}' has no positive duration")]
    InvalidService(String),

    #[error("Could not fetch booked slots: {0}")]
    SlotFetchFailed(#[source] PortError),

    #[error("{date} is in the past (today is {today})")]
    DateInPast { date: NaiveDate, today: NaiveDate },

    #[error("{0}")]
    InvalidCustomer(String),

    #[error("{date} {slot} is not a bookable time")]
    SlotNotOffered { date: NaiveDate, slot: NaiveTime },

    /// Another customer took the slot between the grid snapshot and the insert.
    #[error("This slot was just booked. Please choose another one.")]
    SlotTaken,

    #[error("Booking could not be created: {0}")]
    BookingInsertFailed(String),

    #[error("Booking {booking_id} cannot move to {target}")]
    InvalidTransition { booking_id: Uuid, target: BookingStatus },

    #[error("Booking status could not be updated: {0}")]
    StatusUpdateFailed(#[source] PortError),

    #[error("Bookings could not be loaded: {0}")]
    AgendaUnavailable(#[source] PortError),
}

pub type EngineResult<T> = Result<T, EngineError>;
