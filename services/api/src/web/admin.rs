//! services/api/src/web/admin.rs
//!
//! Administrator endpoints: the per-day agenda, the calendar and booking status
//! changes. Every route here sits behind `require_auth`.

use crate::web::{
    engine_rejection, parse_business, protocol::format_slot, rest::BookingResponse,
    state::AppState, Rejection,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use booking_core::domain::{AdminIdentity, BookingStatus, BusinessId, CalendarEntry, DayAgenda, DaySummary};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
pub struct AgendaQuery {
    /// Day to show, `YYYY-MM-DD`.
    pub date: NaiveDate,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq)]
pub struct DaySummaryResponse {
    pub scheduled: usize,
    pub completed: usize,
    pub total: usize,
}

impl From<DaySummary> for DaySummaryResponse {
    fn from(s: DaySummary) -> Self {
        Self {
            scheduled: s.scheduled,
            completed: s.completed,
            total: s.total,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct DayAgendaResponse {
    pub date: NaiveDate,
    pub summary: DaySummaryResponse,
    pub bookings: Vec<BookingResponse>,
}

impl From<DayAgenda> for DayAgendaResponse {
    fn from(agenda: DayAgenda) -> Self {
        Self {
            date: agenda.date,
            summary: agenda.summary.into(),
            bookings: agenda.bookings.into_iter().map(BookingResponse::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CalendarEntryResponse {
    pub booking_id: Uuid,
    pub date: NaiveDate,
    pub slot: String,
    pub customer_name: String,
    pub service: String,
    pub status: String,
}

impl From<CalendarEntry> for CalendarEntryResponse {
    fn from(e: CalendarEntry) -> Self {
        Self {
            booking_id: e.booking_id,
            date: e.date,
            slot: format_slot(e.start_time),
            customer_name: e.customer_name,
            service: e.service,
            status: e.status.to_string(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    /// `completed` or `cancelled`.
    pub status: String,
}

/// Rejects an admin acting on another business.
pub(crate) fn ensure_same_business(
    admin: &AdminIdentity,
    business_id: &BusinessId,
) -> Result<(), Rejection> {
    if &admin.business_id == business_id {
        return Ok(());
    }
    warn!(
        "Admin {} of '{}' tried to access '{}'",
        admin.admin_id, admin.business_id, business_id
    );
    Err((
        StatusCode::FORBIDDEN,
        "This business belongs to another administrator".to_string(),
    ))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Bookings of one day, ordered by start time, with counters.
#[utoipa::path(
    get,
    path = "/admin/businesses/{business_id}/bookings",
    params(("business_id" = String, Path, description = "Business identifier"), AgendaQuery),
    responses(
        (status = 200, description = "Agenda of the day", body = DayAgendaResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Another business")
    )
)]
pub async fn day_bookings_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(business_id): Path<String>,
    Query(query): Query<AgendaQuery>,
) -> Result<Json<DayAgendaResponse>, Rejection> {
    let business_id = parse_business(&business_id)?;
    ensure_same_business(&admin, &business_id)?;

    let agenda = app_state
        .engine
        .day_agenda(&business_id, query.date)
        .await
        .map_err(engine_rejection)?;
    Ok(Json(agenda.into()))
}

/// Every booking of the business, ordered by date and time.
#[utoipa::path(
    get,
    path = "/admin/businesses/{business_id}/calendar",
    params(("business_id" = String, Path, description = "Business identifier")),
    responses(
        (status = 200, description = "Calendar entries", body = [CalendarEntryResponse]),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Another business")
    )
)]
pub async fn calendar_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(business_id): Path<String>,
) -> Result<Json<Vec<CalendarEntryResponse>>, Rejection> {
    let business_id = parse_business(&business_id)?;
    ensure_same_business(&admin, &business_id)?;

    let entries = app_state
        .engine
        .calendar(&business_id)
        .await
        .map_err(engine_rejection)?;
    Ok(Json(entries.into_iter().map(CalendarEntryResponse::from).collect()))
}

/// Completes or cancels a scheduled booking.
#[utoipa::path(
    patch,
    path = "/admin/bookings/{booking_id}/status",
    params(("booking_id" = Uuid, Path, description = "Booking identifier")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = BookingResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Another business"),
        (status = 404, description = "No such booking"),
        (status = 409, description = "Booking is no longer scheduled"),
        (status = 422, description = "Unknown status")
    )
)]
pub async fn update_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<BookingResponse>, Rejection> {
    let target: BookingStatus = req
        .status
        .parse()
        .map_err(|e: booking_core::domain::UnknownStatus| {
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        })?;

    let engine = &app_state.engine;
    let booking = engine.get_booking(booking_id).await.map_err(engine_rejection)?;
    ensure_same_business(&admin, &booking.business_id)?;

    let updated = engine
        .set_booking_status(booking_id, target)
        .await
        .map_err(engine_rejection)?;
    info!("Booking {} is now {}", updated.id, updated.status);
    Ok(Json(updated.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_business_is_forbidden() {
        let admin = AdminIdentity {
            admin_id: Uuid::new_v4(),
            business_id: BusinessId::parse("centro").unwrap(),
        };
        assert!(ensure_same_business(&admin, &BusinessId::parse("centro").unwrap()).is_ok());
        let (status, _) =
            ensure_same_business(&admin, &BusinessId::parse("norte").unwrap()).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
