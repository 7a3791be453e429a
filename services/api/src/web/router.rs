//! services/api/src/web/router.rs
//!
//! Assembles the public and the protected routes into one axum `Router`.

use crate::{
    error::ApiError,
    web::{
        admin::{calendar_handler, day_bookings_handler, update_status_handler},
        auth::{login_handler, logout_handler},
        events::{agenda_events_handler, calendar_events_handler},
        middleware::require_auth,
        rest::{
            create_booking_handler, get_config_handler, health_handler, list_services_handler,
            list_slots_handler,
        },
        state::AppState,
        ws_handler::booking_ws_handler,
    },
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/businesses/{business_id}/config", get(get_config_handler))
        .route("/businesses/{business_id}/services", get(list_services_handler))
        .route("/businesses/{business_id}/slots", get(list_slots_handler))
        .route("/businesses/{business_id}/bookings", post(create_booking_handler))
        .route("/businesses/{business_id}/book", get(booking_ws_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/admin/businesses/{business_id}/bookings",
            get(day_bookings_handler),
        )
        .route(
            "/admin/businesses/{business_id}/calendar",
            get(calendar_handler),
        )
        .route(
            "/admin/businesses/{business_id}/calendar/events",
            get(calendar_events_handler),
        )
        .route(
            "/admin/businesses/{business_id}/events",
            get(agenda_events_handler),
        )
        .route(
            "/admin/bookings/{booking_id}/status",
            patch(update_status_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Ok(Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state))
}
