//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use booking_core::engine::AvailabilityEngine;
use booking_core::ports::{
    AuthStore, BookingRepository, BusinessConfigProvider, ChangeFeed, ServiceCatalog,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: AvailabilityEngine,
    pub auth: Arc<dyn AuthStore>,
    pub changes: Arc<dyn ChangeFeed>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the state from one store implementing every persistence port.
    pub fn with_store<S>(store: Arc<S>, changes: Arc<dyn ChangeFeed>, config: Arc<Config>) -> Self
    where
        S: BusinessConfigProvider + ServiceCatalog + BookingRepository + AuthStore + 'static,
    {
        let engine = AvailabilityEngine::new(store.clone(), store.clone(), store.clone());
        Self {
            engine,
            auth: store,
            changes,
            config,
        }
    }
}
