//! crates/booking_core/src/engine.rs
//!
//! The availability engine: ties the ports together to answer "which slots are
//! free", to submit bookings and to serve the admin views.

use chrono::{NaiveDate, NaiveTime};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::booking::{self, BookingOutcome, BookingRequest};
use crate::domain::{
    Booking, BookingStatus, BusinessConfig, BusinessId, CalendarEntry, DayAgenda, DaySummary,
    Service,
};
use crate::error::{EngineError, EngineResult};
use crate::ports::{BookingRepository, BusinessConfigProvider, PortError, ServiceCatalog};
use crate::slots::{compute_slots, truncate_to_minute, SlotGrid, SlotGridError};

/// Availability of one day for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayAvailability {
    /// The business does not open on that weekday.
    Closed(NaiveDate),
    Open(SlotGrid),
}

impl DayAvailability {
    pub fn date(&self) -> NaiveDate {
        match self {
            DayAvailability::Closed(date) => *date,
            DayAvailability::Open(grid) => grid.date,
        }
    }

    pub fn slots(&self) -> &[NaiveTime] {
        match self {
            DayAvailability::Closed(_) => &[],
            DayAvailability::Open(grid) => &grid.slots,
        }
    }
}

#[derive(Clone)]
pub struct AvailabilityEngine {
    configs: Arc<dyn BusinessConfigProvider>,
    services: Arc<dyn ServiceCatalog>,
    bookings: Arc<dyn BookingRepository>,
}

impl AvailabilityEngine {
    pub fn new(
        configs: Arc<dyn BusinessConfigProvider>,
        services: Arc<dyn ServiceCatalog>,
        bookings: Arc<dyn BookingRepository>,
    ) -> Self {
        Self {
            configs,
            services,
            bookings,
        }
    }

    /// Loads the business hours, falling back to `BusinessConfig::default()` when the
    /// business has none stored.
    pub async fn business_config(&self, business_id: &BusinessId) -> EngineResult<BusinessConfig> {
        let config = match self.configs.get_config(business_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                warn!(
                    "No configuration found for business '{}'. Using default hours.",
                    business_id
                );
                BusinessConfig::default()
            }
            Err(e) => return Err(EngineError::ConfigUnavailable(e)),
        };

        if config.opening_time >= config.closing_time {
            return Err(EngineError::InvalidHours {
                opening: config.opening_time,
                closing: config.closing_time,
            });
        }
        Ok(config)
    }

    pub async fn active_services(&self, business_id: &BusinessId) -> EngineResult<Vec<Service>> {
        self.services
            .list_active_services(business_id)
            .await
            .map_err(EngineError::ServiceListUnavailable)
    }

    pub async fn find_service(&self, business_id: &BusinessId, name: &str) -> EngineResult<Service> {
        self.active_services(business_id)
            .await?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| EngineError::UnknownService(name.to_string()))
    }

    /// Computes the free slots of `date` for `service` from a fresh read of the
    /// day's bookings. Cancelled bookings do not hold their slot.
    pub async fn available_slots(
        &self,
        business_id: &BusinessId,
        date: NaiveDate,
        service: &Service,
    ) -> EngineResult<DayAvailability> {
        let config = self.business_config(business_id).await?;
        if !config.is_operating_day(date) {
            return Ok(DayAvailability::Closed(date));
        }

        let booked: HashSet<NaiveTime> = self
            .bookings
            .list_for_date(business_id, date)
            .await
            .map_err(EngineError::SlotFetchFailed)?
            .into_iter()
            .filter(|b| b.status.occupies_slot())
            .map(|b| b.start_time)
            .collect();

        let grid = compute_slots(
            date,
            config.opening_time,
            config.closing_time,
            service.duration_minutes,
            &booked,
        )
        .map_err(|e| grid_error(e, service))?;
        Ok(DayAvailability::Open(grid))
    }

    /// Checks that a request carries usable customer details and names an active
    /// service and a position of that service's grid on an operating day no earlier
    /// than `today`. Whether the slot is still free is left to the insert.
    pub async fn validate_request(
        &self,
        request: &BookingRequest,
        today: NaiveDate,
    ) -> EngineResult<Service> {
        booking::check_customer_details(&request.customer_name, &request.phone)
            .map_err(EngineError::InvalidCustomer)?;
        if request.date < today {
            return Err(EngineError::DateInPast {
                date: request.date,
                today,
            });
        }
        let service = self.find_service(&request.business_id, &request.service).await?;
        let config = self.business_config(&request.business_id).await?;
        let offered = config.is_operating_day(request.date)
            && compute_slots(
                request.date,
                config.opening_time,
                config.closing_time,
                service.duration_minutes,
                &HashSet::new(),
            )
            .map_err(|e| grid_error(e, &service))?
            .contains(truncate_to_minute(request.slot));

        if offered {
            Ok(service)
        } else {
            Err(EngineError::SlotNotOffered {
                date: request.date,
                slot: request.slot,
            })
        }
    }

    pub async fn submit_booking(&self, request: BookingRequest) -> BookingOutcome {
        booking::submit_booking(self.bookings.as_ref(), request).await
    }

    /// Completes or cancels a scheduled booking. Statuses only move forward.
    pub async fn set_booking_status(
        &self,
        booking_id: Uuid,
        target: BookingStatus,
    ) -> EngineResult<Booking> {
        if target == BookingStatus::Scheduled {
            return Err(EngineError::InvalidTransition { booking_id, target });
        }

        let current = self
            .bookings
            .get_booking(booking_id)
            .await
            .map_err(EngineError::StatusUpdateFailed)?;
        if current.status != BookingStatus::Scheduled {
            return Err(EngineError::InvalidTransition { booking_id, target });
        }

        match self.bookings.update_status(booking_id, target).await {
            Ok(updated) => Ok(updated),
            // Someone else moved it between the read and the update.
            Err(PortError::NotFound(_)) => Err(EngineError::InvalidTransition { booking_id, target }),
            Err(e) => Err(EngineError::StatusUpdateFailed(e)),
        }
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await
            .map_err(EngineError::AgendaUnavailable)
    }

    pub async fn day_agenda(&self, business_id: &BusinessId, date: NaiveDate) -> EngineResult<DayAgenda> {
        let mut bookings = self
            .bookings
            .list_for_date(business_id, date)
            .await
            .map_err(EngineError::AgendaUnavailable)?;
        bookings.sort_by_key(|b| b.start_time);
        let summary = DaySummary::from_bookings(&bookings);
        Ok(DayAgenda {
            date,
            bookings,
            summary,
        })
    }

    pub async fn calendar(&self, business_id: &BusinessId) -> EngineResult<Vec<CalendarEntry>> {
        let bookings = self
            .bookings
            .list_for_business(business_id)
            .await
            .map_err(EngineError::AgendaUnavailable)?;
        let mut entries: Vec<CalendarEntry> = bookings.iter().map(CalendarEntry::from).collect();
        entries.sort_by_key(|e| (e.date, e.start_time));
        Ok(entries)
    }
}

fn grid_error(e: SlotGridError, service: &Service) -> EngineError {
    match e {
        SlotGridError::InvalidHours { opening, closing } => EngineError::InvalidHours { opening, closing },
        SlotGridError::ZeroDuration => EngineError::InvalidService(service.name.clone()),
    }
}
