pub mod analytics;
pub mod auth;
pub mod cors;
pub mod middleware;
pub mod rest;
pub mod state;

#[cfg(test)]
mod test_utils;

// Re-export the handlers so the binary can build the router from one place.
pub use analytics::{contract_values_handler, team_performance_handler};
pub use auth::{login_handler, logout_handler, signup_handler};
pub use middleware::require_auth;
pub use rest::{batch_visit_update_handler, list_line_items_handler, reconciliation_handler};
