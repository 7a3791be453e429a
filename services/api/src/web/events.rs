//! services/api/src/web/events.rs
//!
//! Server-sent events for the admin views. The daily table is re-read and re-sent
//! whenever a change touches the displayed date; the calendar on every change.

use crate::web::{
    admin::{ensure_same_business, AgendaQuery, CalendarEntryResponse, DayAgendaResponse},
    engine_rejection, parse_business,
    state::AppState,
    Rejection,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use booking_core::domain::{AdminIdentity, BusinessId};
use booking_core::engine::AvailabilityEngine;
use booking_core::ports::BookingChangeStream;
use chrono::NaiveDate;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use tracing::{error, info};

pub(crate) const AGENDA_EVENT: &str = "agenda";
pub(crate) const CALENDAR_EVENT: &str = "calendar";

fn encode(name: &'static str, data: impl Serialize) -> Option<Event> {
    match Event::default().event(name).json_data(data) {
        Ok(event) => Some(event),
        Err(e) => {
            error!("Failed to encode {} event: {:?}", name, e);
            None
        }
    }
}

async fn subscribe(app_state: &AppState, business_id: &BusinessId) -> Result<BookingChangeStream, Rejection> {
    app_state.changes.subscribe(business_id).await.map_err(|e| {
        error!("Failed to subscribe to booking changes: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Live updates unavailable".to_string(),
        )
    })
}

async fn agenda_event(
    engine: &AvailabilityEngine,
    business_id: &BusinessId,
    date: NaiveDate,
) -> Option<Event> {
    let agenda = match engine.day_agenda(business_id, date).await {
        Ok(agenda) => agenda,
        Err(e) => {
            error!("Failed to reload agenda of {} for '{}': {:?}", date, business_id, e);
            return None;
        }
    };
    encode(AGENDA_EVENT, DayAgendaResponse::from(agenda))
}

async fn calendar_event(engine: &AvailabilityEngine, business_id: &BusinessId) -> Option<Event> {
    match engine.calendar(business_id).await {
        Ok(entries) => encode(
            CALENDAR_EVENT,
            entries
                .into_iter()
                .map(CalendarEntryResponse::from)
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            error!("Failed to reload calendar of '{}': {:?}", business_id, e);
            None
        }
    }
}

/// Live agenda of one day.
///
/// Sends an `agenda` event with the day's bookings when the stream opens and again
/// after every change to that date.
#[utoipa::path(
    get,
    path = "/admin/businesses/{business_id}/events",
    params(("business_id" = String, Path, description = "Business identifier"), AgendaQuery),
    responses(
        (status = 200, description = "Stream of `agenda` events", content_type = "text/event-stream", body = DayAgendaResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Another business")
    )
)]
pub async fn agenda_events_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(business_id): Path<String>,
    Query(query): Query<AgendaQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Rejection> {
    let business_id = parse_business(&business_id)?;
    ensure_same_business(&admin, &business_id)?;

    // Fail before the stream opens if the agenda cannot be read at all.
    app_state
        .engine
        .day_agenda(&business_id, query.date)
        .await
        .map_err(engine_rejection)?;

    let mut changes = subscribe(&app_state, &business_id).await?;
    let engine = app_state.engine.clone();
    let date = query.date;
    info!("Admin {} watching agenda of {} for '{}'", admin.admin_id, date, business_id);

    let stream = async_stream::stream! {
        if let Some(event) = agenda_event(&engine, &business_id, date).await {
            yield Ok(event);
        }
        while let Some(change) = changes.next().await {
            if !change.touches(date) {
                continue;
            }
            if let Some(event) = agenda_event(&engine, &business_id, date).await {
                yield Ok(event);
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Live calendar of the business.
///
/// Sends a `calendar` event with every booking when the stream opens and again
/// after each change.
#[utoipa::path(
    get,
    path = "/admin/businesses/{business_id}/calendar/events",
    params(("business_id" = String, Path, description = "Business identifier")),
    responses(
        (status = 200, description = "Stream of `calendar` events", content_type = "text/event-stream", body = [CalendarEntryResponse]),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Another business")
    )
)]
pub async fn calendar_events_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(business_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Rejection> {
    let business_id = parse_business(&business_id)?;
    ensure_same_business(&admin, &business_id)?;

    app_state
        .engine
        .calendar(&business_id)
        .await
        .map_err(engine_rejection)?;

    let mut changes = subscribe(&app_state, &business_id).await?;
    let engine = app_state.engine.clone();
    info!("Admin {} watching calendar of '{}'", admin.admin_id, business_id);

    let stream = async_stream::stream! {
        if let Some(event) = calendar_event(&engine, &business_id).await {
            yield Ok(event);
        }
        while changes.next().await.is_some() {
            if let Some(event) = calendar_event(&engine, &business_id).await {
                yield Ok(event);
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
