pub mod booking;
pub mod changes;
pub mod domain;
pub mod engine;
pub mod error;
pub mod memory;
pub mod ports;
pub mod selection;
pub mod slots;

pub use booking::{submit_booking, BookingOutcome, BookingRequest};
pub use domain::{
    AdminCredentials, AdminIdentity, Booking, BookingChange, BookingStatus, BusinessConfig,
    BusinessId, CalendarEntry, DayAgenda, DaySummary, NewBooking, Service,
};
pub use engine::{AvailabilityEngine, DayAvailability};
pub use error::{EngineError, EngineResult};
pub use memory::InMemoryStore;
pub use ports::{
    AuthStore, BookingChangeStream, BookingRepository, BusinessConfigProvider, ChangeFeed,
    PortError, PortResult, ServiceCatalog,
};
pub use selection::{BookingSession, GridRequest, SelectionError, Stage};
pub use slots::{compute_slots, SlotGrid, SlotGridError};
