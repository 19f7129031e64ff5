//! crates/crm_dashboard_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the dashboard's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! caches or hashing libraries.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{CallerIdentity, ContractLineItem, User, UserCredentials};
use crate::visit::LineItemWrite;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, cache).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Contract Line Items ---
    async fn list_line_items(&self, company_id: Uuid) -> PortResult<Vec<ContractLineItem>>;

    /// Returns the requested line items that belong to `company_id`.
    /// Ids belonging to other companies are silently left out.
    async fn get_line_items(
        &self,
        company_id: Uuid,
        line_item_ids: &[Uuid],
    ) -> PortResult<Vec<ContractLineItem>>;

    /// Writes every row in one transaction and returns the number of rows changed.
    async fn apply_line_item_writes(
        &self,
        caller: CallerIdentity,
        company_id: Uuid,
        writes: &[LineItemWrite],
    ) -> PortResult<u64>;

    async fn list_all_line_items(&self) -> PortResult<Vec<ContractLineItem>>;
}

/// A string key-value store with per-entry expiry.
///
/// Rate-limit entries live here so a process-local map can be swapped for a
/// shared cache when the service is scaled out.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    /// Stores `value` under `key`; the entry disappears once `ttl` has elapsed.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> PortResult<()>;

    async fn delete(&self, key: &str) -> PortResult<()>;
}

pub trait PasswordHashingService: Send + Sync {
    /// Produces a salted digest of `plaintext`.
    fn hash_password(&self, plaintext: &str) -> PortResult<String>;

    /// Returns true when `plaintext` matches `digest`. Malformed digests never match.
    fn verify_password(&self, plaintext: &str, digest: &str) -> bool;
}
