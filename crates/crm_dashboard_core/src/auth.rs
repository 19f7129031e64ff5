//! crates/crm_dashboard_core/src/auth.rs
//!
//! The credential verification gate: rate limiting, credential lookup and
//! password verification for logins, plus account registration.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{normalize_email, RateDecision, User};
use crate::ports::{DatabaseService, PasswordHashingService, PortError};
use crate::rate_limit::RateLimiter;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Why a credential check failed. Only ever logged; clients see one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    UnknownEmail,
    InactiveAccount,
    WrongPassword,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Invalid email or password")]
    InvalidCredentials { cause: CredentialFailure },
    #[error("Too many login attempts; retry after {blocked_until}")]
    RateLimited { blocked_until: DateTime<Utc> },
    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("A valid email address is required")]
    InvalidEmail,
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error(transparent)]
    Port(PortError),
}

/// Guards access to the dashboard behind credentials and an attempt-rate policy.
#[derive(Clone)]
pub struct CredentialGate {
    db: Arc<dyn DatabaseService>,
    hasher: Arc<dyn PasswordHashingService>,
    limiter: Arc<RateLimiter>,
}

impl CredentialGate {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        hasher: Arc<dyn PasswordHashingService>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self { db, hasher, limiter }
    }

    /// Authenticates `email`/`password` as of `now`.
    ///
    /// Every attempt counts toward the rate limit for the email; a successful
    /// login clears it.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, LoginError> {
        let email = normalize_email(email);

        let decision = self.limiter.check_and_record(&email, now).await?;
        if let RateDecision::Blocked { blocked_until } = decision {
            warn!(%email, %blocked_until, "Login refused: rate limited");
            return Err(LoginError::RateLimited { blocked_until });
        }

        let creds = match self.db.get_user_by_email(&email).await {
            Ok(creds) => creds,
            Err(PortError::NotFound(_)) => {
                return Err(self.reject(&email, CredentialFailure::UnknownEmail));
            }
            Err(e) => return Err(e.into()),
        };

        if !creds.is_active {
            return Err(self.reject(&email, CredentialFailure::InactiveAccount));
        }

        if !self.hasher.verify_password(password, &creds.hashed_password) {
            return Err(self.reject(&email, CredentialFailure::WrongPassword));
        }

        self.limiter.clear_limit(&email).await?;
        info!(user_id = %creds.user_id, "Login succeeded");
        Ok(creds.to_user())
    }

    /// Creates an active account with a freshly salted digest.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, RegistrationError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(RegistrationError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistrationError::PasswordTooShort);
        }

        let digest = self
            .hasher
            .hash_password(password)
            .map_err(RegistrationError::Port)?;
        let user = self
            .db
            .create_user_with_email(&email, &digest)
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => RegistrationError::EmailTaken,
                other => RegistrationError::Port(other),
            })?;
        info!(user_id = %user.user_id, "Registered new account");
        Ok(user)
    }

    fn reject(&self, email: &str, cause: CredentialFailure) -> LoginError {
        warn!(%email, ?cause, "Login refused");
        LoginError::InvalidCredentials { cause }
    }
}
