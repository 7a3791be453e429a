//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the booking page and the API
//! server. One connection drives one staged booking session.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slots travel as `HH:MM`.
pub fn format_slot(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_slot(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Picks a service by name. Resets date and slot.
    ChooseService { service: String },

    /// Picks a date; the server answers with the slot grid of that date.
    ChooseDate { date: NaiveDate },

    /// Picks one of the offered slots (`HH:MM`).
    ChooseSlot { slot: String },

    /// Customer name and phone as typed so far.
    UpdateDetails {
        name: String,
        #[serde(default)]
        phone: String,
    },

    Submit,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ServiceOption {
    pub name: String,
    pub duration_minutes: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NoAvailabilityReason {
    Closed,
    FullyBooked,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message of every connection.
    SessionReady {
        business_id: String,
        opening_time: String,
        closing_time: String,
        min_date: NaiveDate,
        services: Vec<ServiceOption>,
    },

    ServiceChosen { service: String, duration_minutes: u32 },

    /// The free slots of the chosen date. Sent again whenever bookings of that date change.
    SlotsAvailable {
        date: NaiveDate,
        service: String,
        slots: Vec<String>,
    },

    /// The date has nothing to offer. This is not an error.
    NoAvailability {
        date: NaiveDate,
        reason: NoAvailabilityReason,
    },

    SlotSelected { slot: String },

    /// Whether the submit button may be enabled.
    SubmitState { enabled: bool },

    BookingConfirmed {
        booking_id: Uuid,
        customer_name: String,
        date: NaiveDate,
        slot: String,
    },

    /// The slot was taken by someone else. A fresh grid follows.
    SlotTaken { message: String },

    Error { message: String },
}
