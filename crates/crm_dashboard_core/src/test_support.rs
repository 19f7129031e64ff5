//! In-memory port fakes shared by the unit tests in this crate.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{CallerIdentity, ContractLineItem, User, UserCredentials};
use crate::ports::{DatabaseService, KeyValueStore, PasswordHashingService, PortError, PortResult};
use crate::visit::LineItemWrite;

pub fn line_item(company_id: Uuid, contract_price: f64) -> ContractLineItem {
    ContractLineItem {
        id: Uuid::new_v4(),
        company_id,
        product_name: "Audit".to_string(),
        certification_code: None,
        quadrant: None,
        contract_price,
        updated_price: None,
        trimming_value: 0.0,
        loss_value: 0.0,
        status: None,
        visit_date: None,
        visit_status: None,
        note: None,
        photo_ref: None,
        signing_month: None,
        updated_by: None,
        updated_at: None,
    }
}

#[derive(Default)]
pub struct MemoryDatabase {
    users: Mutex<HashMap<String, UserCredentials>>,
    sessions: Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>,
    line_items: Mutex<Vec<ContractLineItem>>,
}

impl MemoryDatabase {
    pub fn with_line_items(items: Vec<ContractLineItem>) -> Self {
        Self {
            line_items: Mutex::new(items),
            ..Default::default()
        }
    }

    pub fn line_items(&self) -> Vec<ContractLineItem> {
        self.line_items.lock().unwrap().clone()
    }

    pub fn credentials(&self, email: &str) -> Option<UserCredentials> {
        self.users.lock().unwrap().get(email).cloned()
    }

    pub fn set_active(&self, email: &str, active: bool) {
        if let Some(creds) = self.users.lock().unwrap().get_mut(email) {
            creds.is_active = active;
        }
    }
}

#[async_trait]
impl DatabaseService for MemoryDatabase {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(email) {
            return Err(PortError::Conflict(email.to_string()));
        }
        let creds = UserCredentials {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            is_active: true,
        };
        let user = creds.to_user();
        users.insert(email.to_string(), creds);
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.credentials(email)
            .ok_or_else(|| PortError::NotFound(format!("User {email} not found")))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.sessions.lock().unwrap().get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn list_line_items(&self, company_id: Uuid) -> PortResult<Vec<ContractLineItem>> {
        Ok(self
            .line_items()
            .into_iter()
            .filter(|item| item.company_id == company_id)
            .collect())
    }

    async fn get_line_items(
        &self,
        company_id: Uuid,
        line_item_ids: &[Uuid],
    ) -> PortResult<Vec<ContractLineItem>> {
        Ok(self
            .line_items()
            .into_iter()
            .filter(|item| item.company_id == company_id && line_item_ids.contains(&item.id))
            .collect())
    }

    async fn apply_line_item_writes(
        &self,
        caller: CallerIdentity,
        company_id: Uuid,
        writes: &[LineItemWrite],
    ) -> PortResult<u64> {
        let mut items = self.line_items.lock().unwrap();
        let mut updated = 0;
        for write in writes {
            let Some(item) = items
                .iter_mut()
                .find(|item| item.id == write.line_item_id && item.company_id == company_id)
            else {
                continue;
            };
            item.status = Some(write.update.status);
            item.visit_date = Some(write.update.visit_date);
            item.visit_status = Some(write.update.visit_status);
            item.note = write.update.note.clone();
            item.photo_ref = write.update.photo_ref.clone();
            item.signing_month = write.update.signing_month;
            item.updated_price = write.update.updated_price;
            item.trimming_value = write.reconciliation.trimming;
            item.loss_value = write.reconciliation.loss;
            item.updated_by = Some(caller.user_id);
            item.updated_at = Some(Utc::now());
            updated += 1;
        }
        Ok(updated)
    }

    async fn list_all_line_items(&self) -> PortResult<Vec<ContractLineItem>> {
        Ok(self.line_items())
    }
}

/// Ignores TTLs; tests drive time explicitly through the rate limiter.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String, _ttl: Duration) -> PortResult<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// A transparent stand-in for the real hasher so tests stay fast.
pub struct ReversingHasher;

impl PasswordHashingService for ReversingHasher {
    fn hash_password(&self, plaintext: &str) -> PortResult<String> {
        Ok(format!("rev${}", plaintext.chars().rev().collect::<String>()))
    }

    fn verify_password(&self, plaintext: &str, digest: &str) -> bool {
        self.hash_password(plaintext)
            .map(|expected| expected == digest)
            .unwrap_or(false)
    }
}
