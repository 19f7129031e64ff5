pub mod analytics;
pub mod auth;
pub mod domain;
pub mod ports;
pub mod rate_limit;
pub mod reconciliation;
pub mod visit;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use auth::{CredentialFailure, CredentialGate, LoginError, RegistrationError};
pub use domain::{
    AuthSession, CallerIdentity, ContractLineItem, ContractStatus, Quadrant, RateDecision,
    RateLimitEntry, Reconciliation, SigningMonth, User, UserCredentials, VisitStatus,
};
pub use ports::{DatabaseService, KeyValueStore, PasswordHashingService, PortError, PortResult};
pub use rate_limit::{RateLimitPolicy, RateLimiter};
pub use visit::{BatchUpdateError, ValidationError, VisitService, VisitSubmission};
