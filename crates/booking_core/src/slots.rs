//! crates/booking_core/src/slots.rs
//!
//! The slot grid generator. A grid starts at the opening time and steps by the
//! service duration, so two services produce different grids for the same day.

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlotGridError {
    #[error("opening time {opening} is not before closing time {closing}")]
    InvalidHours { opening: NaiveTime, closing: NaiveTime },
    #[error("service duration must be greater than zero")]
    ZeroDuration,
}

/// Free start times of one day for one service duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGrid {
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub slots: Vec<NaiveTime>,
}

impl SlotGrid {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, slot: NaiveTime) -> bool {
        self.slots.contains(&truncate_to_minute(slot))
    }
}

/// Drops seconds and sub-seconds. Stored start times are compared as `HH:MM`.
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Computes the free slots of `date` between `opening` and `closing`.
///
/// A slot is emitted only when it ends at or before `closing`; a trailing partial
/// slot is dropped. Positions whose start time is in `booked` are skipped but the
/// grid keeps its step, so the remaining slots stay aligned to the opening time.
pub fn compute_slots(
    date: NaiveDate,
    opening: NaiveTime,
    closing: NaiveTime,
    duration_minutes: u32,
    booked: &HashSet<NaiveTime>,
) -> Result<SlotGrid, SlotGridError> {
    if opening >= closing {
        return Err(SlotGridError::InvalidHours { opening, closing });
    }
    if duration_minutes == 0 {
        return Err(SlotGridError::ZeroDuration);
    }

    let booked: HashSet<NaiveTime> = booked.iter().copied().map(truncate_to_minute).collect();
    let window = closing - opening;
    let step = Duration::minutes(i64::from(duration_minutes));

    let mut slots = Vec::new();
    let mut offset = Duration::zero();
    while offset < window {
        if offset + step > window {
            break;
        }
        let cursor = opening + offset;
        if !booked.contains(&truncate_to_minute(cursor)) {
            slots.push(cursor);
        }
        offset = offset + step;
    }

    Ok(SlotGrid {
        date,
        duration_minutes,
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    fn grid(open: NaiveTime, close: NaiveTime, duration: u32, booked: &[NaiveTime]) -> Vec<NaiveTime> {
        let booked: HashSet<NaiveTime> = booked.iter().copied().collect();
        compute_slots(day(), open, close, duration, &booked).unwrap().slots
    }

    #[test]
    fn half_hour_day_skips_booked_positions() {
        let slots = grid(t(9, 0), t(18, 0), 30, &[t(9, 30), t(10, 0)]);
        assert_eq!(&slots[..3], &[t(9, 0), t(10, 30), t(11, 0)]);
        assert_eq!(slots.last(), Some(&t(17, 30)));
        // 18 positions in the day minus the two booked ones
        assert_eq!(slots.len(), 16);
    }

    #[test]
    fn first_slot_is_opening_and_all_fit_before_closing() {
        for duration in [5, 15, 20, 25, 30, 45, 50, 60, 90, 120, 540] {
            let slots = grid(t(9, 0), t(18, 0), duration, &[]);
            assert_eq!(slots.first(), Some(&t(9, 0)), "duration {duration}");
            let step = Duration::minutes(duration as i64);
            for slot in &slots {
                assert!(*slot + step <= t(18, 0), "slot {slot} overruns with {duration}");
            }
        }
    }

    #[test]
    fn consecutive_slots_are_exactly_one_duration_apart() {
        let slots = grid(t(8, 15), t(19, 40), 35, &[]);
        for pair in slots.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::minutes(35));
        }
    }

    #[test]
    fn trailing_partial_slot_is_dropped() {
        // 09:00-10:40 with 45 minutes: 09:00, 09:45; 10:30 would end at 11:15
        assert_eq!(grid(t(9, 0), t(10, 40), 45, &[]), vec![t(9, 0), t(9, 45)]);
    }

    #[test]
    fn duration_longer_than_window_yields_empty_grid() {
        assert!(grid(t(9, 0), t(9, 40), 45, &[]).is_empty());
    }

    #[test]
    fn exact_fit_yields_single_slot() {
        assert_eq!(grid(t(9, 0), t(9, 45), 45, &[]), vec![t(9, 0)]);
    }

    #[test]
    fn fully_booked_day_yields_empty_grid() {
        let all = grid(t(9, 0), t(11, 0), 60, &[]);
        assert!(grid(t(9, 0), t(11, 0), 60, &all).is_empty());
    }

    #[test]
    fn removing_booked_positions_preserves_order_of_the_rest() {
        let full = grid(t(10, 0), t(16, 0), 40, &[]);
        let booked = vec![full[1], full[4], full[6]];
        let remaining = grid(t(10, 0), t(16, 0), 40, &booked);
        let expected: Vec<NaiveTime> =
            full.iter().copied().filter(|s| !booked.contains(s)).collect();
        assert_eq!(remaining, expected);
    }

    #[test]
    fn off_grid_bookings_do_not_remove_anything() {
        // A 60-minute service's grid ignores a booking made on a 30-minute grid at 09:30.
        assert_eq!(
            grid(t(9, 0), t(12, 0), 60, &[t(9, 30)]),
            vec![t(9, 0), t(10, 0), t(11, 0)]
        );
    }

    #[test]
    fn booked_times_with_seconds_match_their_minute() {
        let booked = [NaiveTime::from_hms_opt(9, 30, 45).unwrap()];
        assert_eq!(grid(t(9, 0), t(10, 0), 30, &booked), vec![t(9, 0)]);
    }

    #[test]
    fn identical_inputs_give_identical_grids() {
        let booked = [t(12, 0)];
        assert_eq!(
            grid(t(9, 0), t(18, 0), 25, &booked),
            grid(t(9, 0), t(18, 0), 25, &booked)
        );
    }

    #[test]
    fn rejects_invalid_preconditions() {
        let empty = HashSet::new();
        assert_eq!(
            compute_slots(day(), t(18, 0), t(9, 0), 30, &empty),
            Err(SlotGridError::InvalidHours { opening: t(18, 0), closing: t(9, 0) })
        );
        assert_eq!(
            compute_slots(day(), t(9, 0), t(18, 0), 0, &empty),
            Err(SlotGridError::ZeroDuration)
        );
    }
}
