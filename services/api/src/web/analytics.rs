//! services/api/src/web/analytics.rs
//!
//! Read-only endpoints feeding the dashboard charts.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use crm_dashboard_core::analytics::{self, ContractValueBucket, Dimension, TeamMemberPerformance};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::rest::{ErrorResponse, HandlerError};
use crate::web::state::AppState;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContractValuesQuery {
    /// One of `status`, `quadrant` or `certification`; defaults to `status`.
    pub group_by: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ContractValueBucketView {
    pub key: String,
    pub item_count: usize,
    pub total_contract_value: f64,
}

impl From<ContractValueBucket> for ContractValueBucketView {
    fn from(bucket: ContractValueBucket) -> Self {
        Self {
            key: bucket.key,
            item_count: bucket.item_count,
            total_contract_value: bucket.total_contract_value,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TeamMemberView {
    pub user_id: Uuid,
    pub visits_logged: usize,
    pub deals_done: usize,
    pub total_trimming: f64,
    pub total_loss: f64,
}

impl From<TeamMemberPerformance> for TeamMemberView {
    fn from(row: TeamMemberPerformance) -> Self {
        Self {
            user_id: row.user_id,
            visits_logged: row.visits_logged,
            deals_done: row.deals_done,
            total_trimming: row.total_trimming,
            total_loss: row.total_loss,
        }
    }
}

fn load_failed(e: crm_dashboard_core::PortError) -> HandlerError {
    error!("Failed to load line items for analytics: {:?}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            message: "Failed to load analytics".to_string(),
            field: None,
        }),
    )
}

/// Contract value totals grouped by status, quadrant or certification code.
#[utoipa::path(
    get,
    path = "/analytics/contract-values",
    params(ContractValuesQuery),
    responses(
        (status = 200, description = "One bucket per key, largest total first", body = [ContractValueBucketView]),
        (status = 400, description = "Unknown grouping", body = ErrorResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn contract_values_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContractValuesQuery>,
) -> Result<Json<Vec<ContractValueBucketView>>, HandlerError> {
    let dimension = match query.group_by.as_deref() {
        None => Dimension::Status,
        Some(raw) => raw.parse::<Dimension>().map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    message: e.to_string(),
                    field: Some("group_by".to_string()),
                }),
            )
        })?,
    };

    let items = state.db.list_all_line_items().await.map_err(load_failed)?;
    let buckets = analytics::aggregate_contract_values(&items, dimension);
    Ok(Json(buckets.into_iter().map(Into::into).collect()))
}

/// Per-staff visit and deal totals for the manager review page.
#[utoipa::path(
    get,
    path = "/analytics/team-performance",
    responses(
        (status = 200, description = "One row per staff member", body = [TeamMemberView]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn team_performance_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TeamMemberView>>, HandlerError> {
    let items = state.db.list_all_line_items().await.map_err(load_failed)?;
    let rows = analytics::team_performance(&items);
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
