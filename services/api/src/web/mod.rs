pub mod admin;
pub mod auth;
pub mod events;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod router;
pub mod state;
pub mod ws_handler;

use axum::http::StatusCode;
use booking_core::domain::BusinessId;
use chrono::NaiveDate;
use booking_core::error::EngineError;
use booking_core::ports::PortError;
use tracing::error;

// Re-export the handlers the binary and the router need.
pub use middleware::require_auth;
pub use router::build_router;
pub use ws_handler::booking_ws_handler;

/// Rejection type shared by the REST handlers.
pub type Rejection = (StatusCode, String);

/// The server's local calendar date; earlier dates cannot be booked.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Resolves the tenant from the path. A blank id is fatal for the request.
pub(crate) fn parse_business(raw: &str) -> Result<BusinessId, Rejection> {
    BusinessId::parse(raw).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            EngineError::MissingBusiness.to_string(),
        )
    })
}

/// Converts an engine error into the status code and message shown to the user.
pub(crate) fn engine_rejection(e: EngineError) -> Rejection {
    let status = match &e {
        EngineError::MissingBusiness => StatusCode::BAD_REQUEST,
        EngineError::UnknownService(_)
        | EngineError::SlotNotOffered { .. }
        | EngineError::DateInPast { .. }
        | EngineError::InvalidCustomer(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::SlotTaken | EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
        EngineError::StatusUpdateFailed(PortError::NotFound(_))
        | EngineError::AgendaUnavailable(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {:?}", e);
    }
    (status, e.to_string())
}
