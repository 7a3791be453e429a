//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the public REST endpoints of the booking page
//! and the master definition for the OpenAPI specification.

use crate::web::{
    engine_rejection, parse_business,
    protocol::{format_slot, parse_slot},
    state::AppState,
    today, Rejection,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use booking_core::booking::{BookingOutcome, BookingRequest};
use booking_core::domain::{Booking, Service};
use booking_core::engine::DayAvailability;
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        get_config_handler,
        list_services_handler,
        list_slots_handler,
        create_booking_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::admin::day_bookings_handler,
        crate::web::admin::calendar_handler,
        crate::web::admin::update_status_handler,
        crate::web::events::agenda_events_handler,
        crate::web::events::calendar_events_handler,
    ),
    components(
        schemas(
            BusinessConfigResponse,
            ServiceResponse,
            SlotsResponse,
            CreateBookingRequest,
            BookingResponse,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            crate::web::admin::DayAgendaResponse,
            crate::web::admin::DaySummaryResponse,
            crate::web::admin::CalendarEntryResponse,
            crate::web::admin::StatusUpdateRequest,
        )
    ),
    tags(
        (name = "Booking API", description = "Availability, bookings and the admin agenda of each business.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct BusinessConfigResponse {
    pub opening_time: String,
    pub closing_time: String,
    pub operating_days: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ServiceResponse {
    pub name: String,
    pub duration_minutes: u32,
}

impl From<Service> for ServiceResponse {
    fn from(s: Service) -> Self {
        Self {
            name: s.name,
            duration_minutes: s.duration_minutes,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct SlotsQuery {
    /// Name of the service to book.
    pub service: String,
    /// Day to book, `YYYY-MM-DD`.
    pub date: NaiveDate,
}

/// Free start times. An empty list means "no availability", not an error.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub service: String,
    pub closed: bool,
    pub slots: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CreateBookingRequest {
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    pub service: String,
    pub date: NaiveDate,
    /// `HH:MM`, one of the slots returned by `/slots`.
    pub slot: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct BookingResponse {
    pub id: Uuid,
    pub business_id: String,
    pub customer_name: String,
    pub phone: String,
    pub service: String,
    pub date: NaiveDate,
    pub slot: String,
    pub status: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            business_id: b.business_id.to_string(),
            customer_name: b.customer_name,
            phone: b.phone,
            service: b.service,
            date: b.date,
            slot: format_slot(b.start_time),
            status: b.status.to_string(),
        }
    }
}

pub(crate) fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health_handler() -> &'static str {
    "ok"
}

/// Opening hours and operating days of a business.
#[utoipa::path(
    get,
    path = "/businesses/{business_id}/config",
    params(("business_id" = String, Path, description = "Business identifier")),
    responses(
        (status = 200, description = "Business hours", body = BusinessConfigResponse),
        (status = 500, description = "Configuration unavailable")
    )
)]
pub async fn get_config_handler(
    State(app_state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<BusinessConfigResponse>, Rejection> {
    let business_id = parse_business(&business_id)?;
    let config = app_state
        .engine
        .business_config(&business_id)
        .await
        .map_err(engine_rejection)?;

    Ok(Json(BusinessConfigResponse {
        opening_time: format_slot(config.opening_time),
        closing_time: format_slot(config.closing_time),
        operating_days: config
            .operating_days
            .iter()
            .map(|d| weekday_name(*d).to_string())
            .collect(),
    }))
}

/// Active services of a business, ordered by name.
#[utoipa::path(
    get,
    path = "/businesses/{business_id}/services",
    params(("business_id" = String, Path, description = "Business identifier")),
    responses(
        (status = 200, description = "Active services", body = [ServiceResponse]),
        (status = 500, description = "Services unavailable")
    )
)]
pub async fn list_services_handler(
    State(app_state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Vec<ServiceResponse>>, Rejection> {
    let business_id = parse_business(&business_id)?;
    let services = app_state
        .engine
        .active_services(&business_id)
        .await
        .map_err(engine_rejection)?;
    Ok(Json(services.into_iter().map(ServiceResponse::from).collect()))
}

/// Free slots of a date for a service.
#[utoipa::path(
    get,
    path = "/businesses/{business_id}/slots",
    params(("business_id" = String, Path, description = "Business identifier"), SlotsQuery),
    responses(
        (status = 200, description = "Free slots (possibly none)", body = SlotsResponse),
        (status = 422, description = "Unknown service"),
        (status = 500, description = "Bookings could not be read")
    )
)]
pub async fn list_slots_handler(
    State(app_state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, Rejection> {
    let business_id = parse_business(&business_id)?;
    let engine = &app_state.engine;
    let service = engine
        .find_service(&business_id, &query.service)
        .await
        .map_err(engine_rejection)?;
    let availability = engine
        .available_slots(&business_id, query.date, &service)
        .await
        .map_err(engine_rejection)?;

    Ok(Json(SlotsResponse {
        date: query.date,
        service: service.name,
        closed: matches!(availability, DayAvailability::Closed(_)),
        slots: availability.slots().iter().copied().map(format_slot).collect(),
    }))
}

/// Book a slot.
///
/// Returns 409 when another customer took the slot after it was listed; the client
/// should reload the slots and let the customer choose again.
#[utoipa::path(
    post,
    path = "/businesses/{business_id}/bookings",
    params(("business_id" = String, Path, description = "Business identifier")),
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking confirmed", body = BookingResponse),
        (status = 409, description = "Slot just taken"),
        (status = 422, description = "Invalid name, phone, service, date or time"),
        (status = 500, description = "Booking could not be created")
    )
)]
pub async fn create_booking_handler(
    State(app_state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let business_id = parse_business(&business_id)?;
    let slot = parse_slot(&req.slot).ok_or_else(|| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("'{}' is not a valid time", req.slot),
        )
    })?;

    let request = BookingRequest {
        business_id,
        customer_name: req.customer_name,
        phone: req.phone,
        service: req.service,
        date: req.date,
        slot,
    };
    let engine = &app_state.engine;
    engine
        .validate_request(&request, today())
        .await
        .map_err(engine_rejection)?;

    match engine.submit_booking(request).await {
        BookingOutcome::Confirmed(booking) => {
            info!("Booking {} created", booking.id);
            Ok((StatusCode::CREATED, Json(BookingResponse::from(booking))))
        }
        BookingOutcome::SlotTaken => Err((
            StatusCode::CONFLICT,
            "This slot was just booked. Please choose another one.".to_string(),
        )),
        BookingOutcome::Failed(reason) => {
            error!("Failed to create booking: {}", reason);
            Err((StatusCode::INTERNAL_SERVER_ERROR, reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_the_live_streams() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        for path in [
            "/admin/businesses/{business_id}/events",
            "/admin/businesses/{business_id}/calendar/events",
        ] {
            let ok = &doc["paths"][path]["get"]["responses"]["200"];
            assert!(
                ok["content"]["text/event-stream"].is_object(),
                "{} is not documented as an event stream",
                path
            );
        }
        assert!(doc["paths"]["/businesses/{business_id}/bookings"]["post"].is_object());
    }
}
