//! crates/booking_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the booking core.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the data backend, the auth store and the change transport.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    AdminCredentials, AdminIdentity, Booking, BookingChange, BookingStatus, BusinessConfig,
    BusinessId, NewBooking, Service,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g. the database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The backend rejected a write because it collides with a unique key.
    #[error("Uniqueness violation: {0}")]
    UniqueViolation(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Push stream of row changes for one business.
pub type BookingChangeStream = Pin<Box<dyn Stream<Item = BookingChange> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait BusinessConfigProvider: Send + Sync {
    /// Returns the stored hours of a business, or `None` when it has none.
    async fn get_config(&self, business_id: &BusinessId) -> PortResult<Option<BusinessConfig>>;
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Active services of a business ordered by name.
    async fn list_active_services(&self, business_id: &BusinessId) -> PortResult<Vec<Service>>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Bookings of one day, ordered by start time ascending.
    async fn list_for_date(
        &self,
        business_id: &BusinessId,
        date: NaiveDate,
    ) -> PortResult<Vec<Booking>>;

    async fn list_for_business(&self, business_id: &BusinessId) -> PortResult<Vec<Booking>>;

    async fn get_booking(&self, booking_id: Uuid) -> PortResult<Booking>;

    /// Inserts a `scheduled` booking. Fails with `PortError::UniqueViolation` when a
    /// non-cancelled booking already holds the same (business, date, start time).
    async fn insert(&self, booking: NewBooking) -> PortResult<Booking>;

    /// Moves a booking out of `scheduled`. Returns `PortError::NotFound` when no
    /// scheduled booking carries that id.
    async fn update_status(&self, booking_id: Uuid, status: BookingStatus) -> PortResult<Booking>;
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribes to every booking row change of a business.
    async fn subscribe(&self, business_id: &BusinessId) -> PortResult<BookingChangeStream>;
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn create_admin(
        &self,
        business_id: &BusinessId,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<AdminIdentity>;

    async fn get_admin_by_email(&self, email: &str) -> PortResult<AdminCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        admin_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AdminIdentity>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
