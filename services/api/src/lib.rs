//! services/api/src/lib.rs
//!
//! The HTTP service around `crm_dashboard_core`: adapters for PostgreSQL,
//! password hashing and the rate-limit store, plus the Axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
