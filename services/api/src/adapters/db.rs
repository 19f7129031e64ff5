//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use crm_dashboard_core::domain::{
    AuthSession, CallerIdentity, ContractLineItem, ParseLabelError, User, UserCredentials,
};
use crm_dashboard_core::ports::{DatabaseService, PortError, PortResult};
use crm_dashboard_core::visit::LineItemWrite;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const LINE_ITEM_COLUMNS: &str = "id, company_id, product_name, certification_code, quadrant, \
     contract_price, updated_price, trimming_value, loss_value, status, visit_date, \
     visit_status, note, photo_ref, signing_month, updated_by, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn corrupt(e: ParseLabelError) -> PortError {
    PortError::Unexpected(format!("Corrupt row: {e}"))
}

fn parse_optional<T>(raw: Option<String>) -> PortResult<Option<T>>
where
    T: FromStr<Err = ParseLabelError>,
{
    raw.map(|s| s.parse::<T>()).transpose().map_err(corrupt)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
    is_active: bool,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
            is_active: self.is_active,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}
impl AuthSessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user_id: self.user_id,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct LineItemRecord {
    id: Uuid,
    company_id: Uuid,
    product_name: String,
    certification_code: Option<String>,
    quadrant: Option<String>,
    contract_price: f64,
    updated_price: Option<f64>,
    trimming_value: f64,
    loss_value: f64,
    status: Option<String>,
    visit_date: Option<NaiveDate>,
    visit_status: Option<String>,
    note: Option<String>,
    photo_ref: Option<String>,
    signing_month: Option<String>,
    updated_by: Option<Uuid>,
    updated_at: Option<DateTime<Utc>>,
}
impl LineItemRecord {
    fn to_domain(self) -> PortResult<ContractLineItem> {
        Ok(ContractLineItem {
            id: self.id,
            company_id: self.company_id,
            product_name: self.product_name,
            certification_code: self.certification_code,
            quadrant: parse_optional(self.quadrant)?,
            contract_price: self.contract_price,
            updated_price: self.updated_price,
            trimming_value: self.trimming_value,
            loss_value: self.loss_value,
            status: parse_optional(self.status)?,
            visit_date: self.visit_date,
            visit_status: parse_optional(self.visit_status)?,
            note: self.note,
            photo_ref: self.photo_ref,
            signing_month: parse_optional(self.signing_month)?,
            updated_by: self.updated_by,
            updated_at: self.updated_at,
        })
    }
}

fn line_items_to_domain(records: Vec<LineItemRecord>) -> PortResult<Vec<ContractLineItem>> {
    records.into_iter().map(LineItemRecord::to_domain).collect()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("User {} already exists", email))
            }
            other => unexpected(other),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password, is_active FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            other => unexpected(other),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT s.id, s.user_id, s.expires_at FROM auth_sessions s \
             JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND u.is_active",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        let session = record.to_domain();
        if session.expires_at <= Utc::now() {
            debug!(user_id = %session.user_id, "Auth session expired");
            return Err(PortError::Unauthorized);
        }
        Ok(session.user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_line_items(&self, company_id: Uuid) -> PortResult<Vec<ContractLineItem>> {
        let records = sqlx::query_as::<_, LineItemRecord>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM contract_line_items \
             WHERE company_id = $1 ORDER BY product_name ASC, id ASC"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        line_items_to_domain(records)
    }

    async fn get_line_items(
        &self,
        company_id: Uuid,
        line_item_ids: &[Uuid],
    ) -> PortResult<Vec<ContractLineItem>> {
        let records = sqlx::query_as::<_, LineItemRecord>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM contract_line_items \
             WHERE company_id = $1 AND id = ANY($2)"
        ))
        .bind(company_id)
        .bind(line_item_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        line_items_to_domain(records)
    }

    async fn apply_line_item_writes(
        &self,
        caller: CallerIdentity,
        company_id: Uuid,
        writes: &[LineItemWrite],
    ) -> PortResult<u64> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let now = Utc::now();
        let mut updated = 0;

        for write in writes {
            let update = &write.update;
            let result = sqlx::query(
                "UPDATE contract_line_items SET \
                 status = $1, visit_date = $2, visit_status = $3, note = $4, photo_ref = $5, \
                 signing_month = $6, updated_price = $7, trimming_value = $8, loss_value = $9, \
                 updated_by = $10, updated_at = $11 \
                 WHERE id = $12 AND company_id = $13",
            )
            .bind(update.status.as_str())
            .bind(update.visit_date)
            .bind(update.visit_status.as_str())
            .bind(update.note.as_deref())
            .bind(update.photo_ref.as_deref())
            .bind(update.signing_month.map(|m| m.to_string()))
            .bind(update.updated_price)
            .bind(write.reconciliation.trimming)
            .bind(write.reconciliation.loss)
            .bind(caller.user_id)
            .bind(now)
            .bind(write.line_item_id)
            .bind(company_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
            updated += result.rows_affected();
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(updated)
    }

    async fn list_all_line_items(&self) -> PortResult<Vec<ContractLineItem>> {
        let records = sqlx::query_as::<_, LineItemRecord>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM contract_line_items"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        line_items_to_domain(records)
    }
}
