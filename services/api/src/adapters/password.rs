//! services/api/src/adapters/password.rs
//!
//! Argon2id implementation of the `PasswordHashingService` port. Each digest
//! carries its own random salt in PHC string format.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use crm_dashboard_core::ports::{PasswordHashingService, PortError, PortResult};
use tracing::error;

/// Hashes and verifies passwords with the default Argon2id parameters.
#[derive(Clone, Default)]
pub struct Argon2Adapter {
    argon2: Argon2<'static>,
}

impl Argon2Adapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHashingService for Argon2Adapter {
    fn hash_password(&self, plaintext: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                PortError::Unexpected("Failed to hash password".to_string())
            })
    }

    fn verify_password(&self, plaintext: &str, digest: &str) -> bool {
        let parsed_hash = match PasswordHash::new(digest) {
            Ok(hash) => hash,
            Err(e) => {
                error!("Failed to parse password hash: {:?}", e);
                return false;
            }
        };
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
