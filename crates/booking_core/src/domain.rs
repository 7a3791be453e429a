//! crates/booking_core/src/domain.rs
//!
//! Defines the pure, core data structures for the booking application.
//! These structs are independent of any database or serialization format.

use chrono::{NaiveDate, NaiveTime, Weekday};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Tenants and Configuration
//=========================================================================================

/// Identifies the tenant (one shop of the chain) that owns services, hours and bookings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusinessId(String);

impl BusinessId {
    pub const MAX_CHARS: usize = 64;

    /// Builds an id from a raw slug. Returns `None` for a blank or oversized value,
    /// which the callers treat as a fatal "unknown business" condition.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().count() > Self::MAX_CHARS {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusinessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opening hours of a business. Opening and closing fall on the same calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessConfig {
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub operating_days: Vec<Weekday>,
}

impl BusinessConfig {
    pub fn is_operating_day(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        self.operating_days.contains(&date.weekday())
    }
}

impl Default for BusinessConfig {
    /// Hours used when a business has no stored configuration: 09:00-18:00, Monday to Saturday.
    fn default() -> Self {
        Self {
            opening_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            closing_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            operating_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
        }
    }
}

/// A bookable service. The duration drives the slot grid of the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub duration_minutes: u32,
}

//=========================================================================================
// Bookings
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Cancelled bookings no longer hold their slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(BookingStatus::Scheduled),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A stored reservation of one slot by one customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub business_id: BusinessId,
    pub customer_name: String,
    pub phone: String,
    pub service: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub status: BookingStatus,
}

/// The row inserted by the booking flow. Status is always `scheduled` on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub business_id: BusinessId,
    pub customer_name: String,
    pub phone: String,
    pub service: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

/// Counters shown above the admin's daily table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaySummary {
    pub scheduled: usize,
    pub completed: usize,
    pub total: usize,
}

impl DaySummary {
    pub fn from_bookings(bookings: &[Booking]) -> Self {
        bookings.iter().fold(Self::default(), |mut acc, b| {
            match b.status {
                BookingStatus::Scheduled => acc.scheduled += 1,
                BookingStatus::Completed => acc.completed += 1,
                BookingStatus::Cancelled => {}
            }
            acc.total += 1;
            acc
        })
    }
}

/// All bookings of one day for one business, ordered by start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAgenda {
    pub date: NaiveDate,
    pub bookings: Vec<Booking>,
    pub summary: DaySummary,
}

/// Month-calendar projection of a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub booking_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub customer_name: String,
    pub service: String,
    pub status: BookingStatus,
}

impl From<&Booking> for CalendarEntry {
    fn from(b: &Booking) -> Self {
        Self {
            booking_id: b.id,
            date: b.date,
            start_time: b.start_time,
            customer_name: b.customer_name.clone(),
            service: b.service.clone(),
            status: b.status,
        }
    }
}

/// A row-level change pushed by the change feed. Both snapshots are absent when the
/// subscriber missed notifications and has to resynchronise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingChange {
    pub business_id: BusinessId,
    pub old: Option<Booking>,
    pub new: Option<Booking>,
}

//=========================================================================================
// Administrators
//=========================================================================================

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub admin_id: Uuid,
    pub business_id: BusinessId,
    pub email: String,
    pub hashed_password: String,
}

/// The authenticated administrator attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub admin_id: Uuid,
    pub business_id: BusinessId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_id_rejects_blank_and_oversized() {
        assert!(BusinessId::parse("   ").is_none());
        assert_eq!(BusinessId::parse(" centro ").unwrap().as_str(), "centro");
        assert!(BusinessId::parse(&"b".repeat(BusinessId::MAX_CHARS)).is_some());
        assert!(BusinessId::parse(&"b".repeat(BusinessId::MAX_CHARS + 1)).is_none());
    }

    #[test]
    fn status_parses_both_spellings() {
        assert_eq!("Cancelled".parse::<BookingStatus>(), Ok(BookingStatus::Cancelled));
        assert_eq!("canceled".parse::<BookingStatus>(), Ok(BookingStatus::Cancelled));
        assert!("pending".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn default_config_closes_on_sunday() {
        let config = BusinessConfig::default();
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(!config.is_operating_day(sunday));
        assert!(config.is_operating_day(monday));
    }
}
