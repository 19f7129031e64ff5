//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crm_dashboard_core::ports::{DatabaseService, KeyValueStore, PasswordHashingService};
use crm_dashboard_core::{CredentialGate, RateLimiter, VisitService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub gate: CredentialGate,
    pub visits: VisitService,
}

impl AppState {
    /// Wires the core services on top of the given adapters.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        kv: Arc<dyn KeyValueStore>,
        hasher: Arc<dyn PasswordHashingService>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(kv, config.rate_limit));
        Self {
            gate: CredentialGate::new(db.clone(), hasher, limiter),
            visits: VisitService::new(db.clone()),
            db,
            config,
        }
    }
}
