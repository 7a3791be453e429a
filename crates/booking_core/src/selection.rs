//! crates/booking_core/src/selection.rs
//!
//! The customer's staged selection, held in one owned struct per booking session.
//! Each step gates the next: service, then date, then slot, then customer details,
//! then submission.

use chrono::{NaiveDate, NaiveTime};

use crate::booking::{BookingOutcome, BookingRequest};
use crate::domain::{Booking, BusinessId, Service};
use crate::engine::DayAvailability;
use crate::slots::truncate_to_minute;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NoService,
    ServiceChosen,
    DateChosen,
    SlotChosen,
    DetailsEntered,
    Submitting,
    Confirmed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Choose a service first")]
    NoService,
    #[error("Choose a date first")]
    NoDate,
    #[error("Dates before {today} cannot be booked")]
    DateInPast { today: NaiveDate },
    #[error("{0} is not one of the offered times")]
    SlotNotOffered(NaiveTime),
    #[error("Availability does not match the current selection")]
    StaleAvailability,
    #[error("Service, date, time and name are required")]
    Incomplete,
    #[error("A booking is already being submitted")]
    Busy,
    #[error("This booking is already confirmed")]
    Finished,
}

/// What the session needs regenerated: the grid of `date` for `service`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRequest {
    pub service: Service,
    pub date: NaiveDate,
}

#[derive(Debug)]
pub struct BookingSession {
    business_id: BusinessId,
    service: Option<Service>,
    date: Option<NaiveDate>,
    availability: Option<DayAvailability>,
    slot: Option<NaiveTime>,
    customer_name: String,
    phone: String,
    submitting: bool,
    confirmed: Option<Booking>,
    last_error: Option<String>,
}

impl BookingSession {
    pub fn new(business_id: BusinessId) -> Self {
        Self {
            business_id,
            service: None,
            date: None,
            availability: None,
            slot: None,
            customer_name: String::new(),
            phone: String::new(),
            submitting: false,
            confirmed: None,
            last_error: None,
        }
    }

    pub fn business_id(&self) -> &BusinessId {
        &self.business_id
    }

    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn slot(&self) -> Option<NaiveTime> {
        self.slot
    }

    pub fn availability(&self) -> Option<&DayAvailability> {
        self.availability.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn stage(&self) -> Stage {
        if self.confirmed.is_some() {
            Stage::Confirmed
        } else if self.submitting {
            Stage::Submitting
        } else if self.last_error.is_some() {
            Stage::Error
        } else if self.slot.is_some() && !self.customer_name.trim().is_empty() {
            Stage::DetailsEntered
        } else if self.slot.is_some() {
            Stage::SlotChosen
        } else if self.date.is_some() {
            Stage::DateChosen
        } else if self.service.is_some() {
            Stage::ServiceChosen
        } else {
            Stage::NoService
        }
    }

    fn ensure_editable(&self) -> Result<(), SelectionError> {
        if self.confirmed.is_some() {
            return Err(SelectionError::Finished);
        }
        if self.submitting {
            return Err(SelectionError::Busy);
        }
        Ok(())
    }

    /// Picks a service. The grid depends on the duration, so date, slot and grid reset.
    pub fn choose_service(&mut self, service: Service) -> Result<(), SelectionError> {
        self.ensure_editable()?;
        self.service = Some(service);
        self.date = None;
        self.availability = None;
        self.slot = None;
        self.last_error = None;
        Ok(())
    }

    /// Picks a date and returns the grid that has to be generated for it.
    pub fn choose_date(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<GridRequest, SelectionError> {
        self.ensure_editable()?;
        let service = self.service.clone().ok_or(SelectionError::NoService)?;
        if date < today {
            return Err(SelectionError::DateInPast { today });
        }
        self.date = Some(date);
        self.availability = None;
        self.slot = None;
        self.last_error = None;
        Ok(GridRequest { service, date })
    }

    /// The grid to regenerate after a change notification, if a date is showing.
    pub fn refresh_request(&self) -> Option<GridRequest> {
        if self.confirmed.is_some() {
            return None;
        }
        match (&self.service, self.date) {
            (Some(service), Some(date)) => Some(GridRequest {
                service: service.clone(),
                date,
            }),
            _ => None,
        }
    }

    /// Stores a freshly generated grid. A chosen slot that is no longer offered is dropped.
    pub fn apply_availability(&mut self, availability: DayAvailability) -> Result<(), SelectionError> {
        let matches_selection = match (&self.service, self.date) {
            (Some(service), Some(date)) => {
                availability.date() == date
                    && match &availability {
                        DayAvailability::Open(grid) => grid.duration_minutes == service.duration_minutes,
                        DayAvailability::Closed(_) => true,
                    }
            }
            _ => false,
        };
        if !matches_selection {
            return Err(SelectionError::StaleAvailability);
        }

        if !self.submitting {
            if let Some(slot) = self.slot {
                if !availability.slots().contains(&slot) {
                    self.slot = None;
                }
            }
        }
        self.availability = Some(availability);
        Ok(())
    }

    pub fn choose_slot(&mut self, slot: NaiveTime) -> Result<(), SelectionError> {
        self.ensure_editable()?;
        let availability = self.availability.as_ref().ok_or(SelectionError::NoDate)?;
        let slot = truncate_to_minute(slot);
        if !availability.slots().contains(&slot) {
            return Err(SelectionError::SlotNotOffered(slot));
        }
        self.slot = Some(slot);
        self.last_error = None;
        Ok(())
    }

    pub fn enter_details(&mut self, customer_name: &str, phone: &str) -> Result<(), SelectionError> {
        self.ensure_editable()?;
        self.customer_name = customer_name.to_string();
        self.phone = phone.to_string();
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.confirmed.is_none()
            && !self.submitting
            && self.service.is_some()
            && self.date.is_some()
            && self.slot.is_some()
            && !self.customer_name.trim().is_empty()
    }

    /// Locks the session and hands out the request to insert.
    pub fn begin_submit(&mut self) -> Result<BookingRequest, SelectionError> {
        self.ensure_editable()?;
        if !self.can_submit() {
            return Err(SelectionError::Incomplete);
        }
        let (Some(service), Some(date), Some(slot)) = (&self.service, self.date, self.slot) else {
            return Err(SelectionError::Incomplete);
        };
        let request = BookingRequest {
            business_id: self.business_id.clone(),
            customer_name: self.customer_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            service: service.name.clone(),
            date,
            slot,
        };
        self.submitting = true;
        self.last_error = None;
        Ok(request)
    }

    /// Records the insert result. After `SlotTaken` the slot and grid are dropped so
    /// the caller regenerates availability before the customer retries.
    pub fn finish_submit(&mut self, outcome: &BookingOutcome) {
        self.submitting = false;
        match outcome {
            BookingOutcome::Confirmed(booking) => {
                self.confirmed = Some(booking.clone());
                self.last_error = None;
            }
            BookingOutcome::SlotTaken => {
                self.slot = None;
                self.availability = None;
                self.last_error = Some("This slot was just booked. Please choose another one.".to_string());
            }
            BookingOutcome::Failed(reason) => {
                self.last_error = Some(reason.clone());
            }
        }
    }

    pub fn confirmed(&self) -> Option<&Booking> {
        self.confirmed.as_ref()
    }
}
