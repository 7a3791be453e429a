//! crates/booking_core/src/changes.rs
//!
//! Helpers for consumers of the change feed. Notifications are not applied as
//! deltas: a consumer only decides whether a change touches the date it displays
//! and, if so, re-queries that date. Reprocessing a notification is therefore harmless.

use chrono::NaiveDate;

use crate::domain::{BookingChange, BusinessId};

impl BookingChange {
    /// A notice telling subscribers they may have missed changes.
    pub fn resync(business_id: BusinessId) -> Self {
        Self {
            business_id,
            old: None,
            new: None,
        }
    }

    pub fn is_resync(&self) -> bool {
        self.old.is_none() && self.new.is_none()
    }

    /// Dates whose bookings changed. A booking moved between days touches both.
    pub fn affected_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .new
            .iter()
            .chain(self.old.iter())
            .map(|b| b.date)
            .collect();
        dates.dedup();
        dates
    }

    /// Whether a view showing `date` has to re-fetch.
    pub fn touches(&self, date: NaiveDate) -> bool {
        self.is_resync() || self.affected_dates().contains(&date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Booking, BookingStatus};
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn booking(day: u32) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            business_id: BusinessId::parse("centro").unwrap(),
            customer_name: "Ana".into(),
            phone: String::new(),
            service: "Corte".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status: BookingStatus::Scheduled,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    #[test]
    fn insert_touches_only_its_day() {
        let change = BookingChange {
            business_id: BusinessId::parse("centro").unwrap(),
            old: None,
            new: Some(booking(20)),
        };
        assert!(change.touches(date(20)));
        assert!(!change.touches(date(21)));
    }

    #[test]
    fn moved_booking_touches_both_days() {
        let change = BookingChange {
            business_id: BusinessId::parse("centro").unwrap(),
            old: Some(booking(20)),
            new: Some(booking(22)),
        };
        assert_eq!(change.affected_dates(), vec![date(22), date(20)]);
    }

    #[test]
    fn status_update_reports_day_once() {
        let before = booking(20);
        let mut after = before.clone();
        after.status = BookingStatus::Completed;
        let change = BookingChange {
            business_id: before.business_id.clone(),
            old: Some(before),
            new: Some(after),
        };
        assert_eq!(change.affected_dates(), vec![date(20)]);
    }

    #[test]
    fn resync_touches_every_day() {
        let change = BookingChange::resync(BusinessId::parse("centro").unwrap());
        assert!(change.is_resync());
        assert!(change.touches(date(1)));
    }
}
