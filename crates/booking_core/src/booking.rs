//! crates/booking_core/src/booking.rs
//!
//! Booking submission. Availability is computed from a snapshot, so two customers
//! can race for the same slot; the repository's uniqueness constraint decides, and
//! a violation is reported as `SlotTaken` instead of a generic failure.

use chrono::{NaiveDate, NaiveTime};
use tracing::{info, warn};

use crate::domain::{Booking, BusinessId, NewBooking};
use crate::error::EngineError;
use crate::ports::{BookingRepository, PortError};
use crate::slots::truncate_to_minute;

pub const MAX_CUSTOMER_NAME_CHARS: usize = 120;
pub const MAX_PHONE_CHARS: usize = 40;

/// Everything the customer selected, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub business_id: BusinessId,
    pub customer_name: String,
    pub phone: String,
    pub service: String,
    pub date: NaiveDate,
    pub slot: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Confirmed(Booking),
    /// The slot was taken by someone else. The caller must regenerate the grid
    /// before offering a retry.
    SlotTaken,
    Failed(String),
}

impl BookingOutcome {
    pub fn into_result(self) -> Result<Booking, EngineError> {
        match self {
            BookingOutcome::Confirmed(booking) => Ok(booking),
            BookingOutcome::SlotTaken => Err(EngineError::SlotTaken),
            BookingOutcome::Failed(reason) => Err(EngineError::BookingInsertFailed(reason)),
        }
    }
}

/// Rejects a blank name and contact details longer than the stored columns allow.
pub fn check_customer_details(customer_name: &str, phone: &str) -> Result<(), String> {
    let name = customer_name.trim();
    if name.is_empty() {
        return Err("Customer name is required".to_string());
    }
    if name.chars().count() > MAX_CUSTOMER_NAME_CHARS {
        return Err(format!(
            "Customer name must be at most {} characters",
            MAX_CUSTOMER_NAME_CHARS
        ));
    }
    if phone.trim().chars().count() > MAX_PHONE_CHARS {
        return Err(format!("Phone must be at most {} characters", MAX_PHONE_CHARS));
    }
    Ok(())
}

/// Issues a single insert for the request and classifies the result.
pub async fn submit_booking(
    repository: &dyn BookingRepository,
    request: BookingRequest,
) -> BookingOutcome {
    if let Err(reason) = check_customer_details(&request.customer_name, &request.phone) {
        return BookingOutcome::Failed(reason);
    }
    let customer_name = request.customer_name.trim().to_string();

    let new_booking = NewBooking {
        business_id: request.business_id,
        customer_name,
        phone: request.phone.trim().to_string(),
        service: request.service,
        date: request.date,
        start_time: truncate_to_minute(request.slot),
    };

    match repository.insert(new_booking).await {
        Ok(booking) => {
            info!(
                "Booking {} confirmed for {} at {} {}",
                booking.id, booking.business_id, booking.date, booking.start_time
            );
            BookingOutcome::Confirmed(booking)
        }
        Err(PortError::UniqueViolation(detail)) => {
            warn!("Slot already taken: {}", detail);
            BookingOutcome::SlotTaken
        }
        Err(e) => BookingOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookingStatus;
    use crate::memory::InMemoryStore;

    fn request(name: &str, slot: NaiveTime) -> BookingRequest {
        BookingRequest {
            business_id: BusinessId::parse("centro").unwrap(),
            customer_name: name.to_string(),
            phone: "555-0101".to_string(),
            service: "Corte".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            slot,
        }
    }

    fn two_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(14, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn confirmed_booking_is_scheduled_and_trimmed() {
        let store = InMemoryStore::new();
        let outcome = submit_booking(&store, request("  Ana  ", two_pm())).await;
        match outcome {
            BookingOutcome::Confirmed(booking) => {
                assert_eq!(booking.customer_name, "Ana");
                assert_eq!(booking.status, BookingStatus::Scheduled);
                assert_eq!(booking.start_time, two_pm());
            }
            other => panic!("expected confirmation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn concurrent_submissions_for_one_slot_confirm_exactly_one() {
        let store = InMemoryStore::new();
        let (first, second) = futures::join!(
            submit_booking(&store, request("Ana", two_pm())),
            submit_booking(&store, request("Luis", two_pm())),
        );

        let outcomes = [first, second];
        let confirmed = outcomes
            .iter()
            .filter(|o| matches!(o, BookingOutcome::Confirmed(_)))
            .count();
        let taken = outcomes
            .iter()
            .filter(|o| matches!(o, BookingOutcome::SlotTaken))
            .count();
        assert_eq!((confirmed, taken), (1, 1));
    }

    #[tokio::test]
    async fn blank_name_fails_without_inserting() {
        let store = InMemoryStore::new();
        let outcome = submit_booking(&store, request("   ", two_pm())).await;
        assert!(matches!(outcome, BookingOutcome::Failed(_)));

        let retry = submit_booking(&store, request("Ana", two_pm())).await;
        assert!(matches!(retry, BookingOutcome::Confirmed(_)));
    }

    #[tokio::test]
    async fn oversized_details_fail_without_inserting() {
        let store = InMemoryStore::new();
        let long_name = "A".repeat(MAX_CUSTOMER_NAME_CHARS + 1);
        let outcome = submit_booking(&store, request(&long_name, two_pm())).await;
        assert!(matches!(outcome, BookingOutcome::Failed(_)));

        let mut long_phone = request("Ana", two_pm());
        long_phone.phone = "6".repeat(MAX_PHONE_CHARS + 1);
        assert!(matches!(
            submit_booking(&store, long_phone).await,
            BookingOutcome::Failed(_)
        ));

        let exact = "Ñ".repeat(MAX_CUSTOMER_NAME_CHARS);
        assert!(matches!(
            submit_booking(&store, request(&exact, two_pm())).await,
            BookingOutcome::Confirmed(_)
        ));
    }

    #[test]
    fn outcome_maps_onto_engine_errors() {
        assert!(matches!(
            BookingOutcome::SlotTaken.into_result(),
            Err(EngineError::SlotTaken)
        ));
        assert!(matches!(
            BookingOutcome::Failed("db down".into()).into_result(),
            Err(EngineError::BookingInsertFailed(reason)) if reason == "db down"
        ));
    }
}
