//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting the admin routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use booking_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::{auth::session_from_headers, state::AppState};

/// Validates the session cookie and inserts the `AdminIdentity` into the request
/// extensions. Missing, unknown or expired sessions get 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let admin = state
        .auth
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized | PortError::NotFound(_) => {
                warn!("Rejected admin request with invalid session");
                StatusCode::UNAUTHORIZED
            }
            other => {
                error!("Failed to validate auth session: {:?}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    req.extensions_mut().insert(admin);
    Ok(next.run(req).await)
}
