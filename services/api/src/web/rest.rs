//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the contract and visit REST endpoints and the
//! master definition for the OpenAPI specification.

use crate::web::{analytics, auth, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use crm_dashboard_core::{
    reconciliation, BatchUpdateError, CallerIdentity, ContractLineItem, ContractStatus,
    SigningMonth, VisitStatus, VisitSubmission,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        reconciliation_handler,
        list_line_items_handler,
        batch_visit_update_handler,
        analytics::contract_values_handler,
        analytics::team_performance_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            AmountInput,
            ReconciliationRequest,
            ReconciliationResponse,
            LineItemView,
            BatchVisitUpdateRequest,
            BatchVisitUpdateResponse,
            ErrorResponse,
            analytics::ContractValueBucketView,
            analytics::TeamMemberView,
        )
    ),
    tags(
        (name = "CRM Dashboard API", description = "Visits, contract reconciliation and dashboard analytics.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// An error body that names the offending form field when there is one.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

pub type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
            field: None,
        }),
    )
}

/// A price as typed into a form: either a JSON number or text such as `"1,200,000"`.
#[derive(Deserialize, ToSchema, Clone, Debug)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    fn to_amount(&self) -> Option<f64> {
        match self {
            AmountInput::Number(n) => Some(*n).filter(|n| n.is_finite()),
            AmountInput::Text(s) => reconciliation::parse_amount(s),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ReconciliationRequest {
    pub contract_price: Option<AmountInput>,
    pub updated_price: Option<AmountInput>,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct ReconciliationResponse {
    pub trimming: f64,
    pub loss: f64,
}

/// A contract line item as shown in the company table.
#[derive(Serialize, ToSchema)]
pub struct LineItemView {
    pub id: Uuid,
    pub company_id: Uuid,
    pub product_name: String,
    pub certification_code: Option<String>,
    pub quadrant: Option<String>,
    pub contract_price: f64,
    pub updated_price: Option<f64>,
    pub trimming_value: f64,
    pub loss_value: f64,
    pub status: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub visit_status: Option<String>,
    pub note: Option<String>,
    pub photo_ref: Option<String>,
    pub signing_month: Option<String>,
    pub updated_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ContractLineItem> for LineItemView {
    fn from(item: ContractLineItem) -> Self {
        Self {
            id: item.id,
            company_id: item.company_id,
            product_name: item.product_name,
            certification_code: item.certification_code,
            quadrant: item.quadrant.map(|q| q.as_str().to_string()),
            contract_price: item.contract_price,
            updated_price: item.updated_price,
            trimming_value: item.trimming_value,
            loss_value: item.loss_value,
            status: item.status.map(|s| s.as_str().to_string()),
            visit_date: item.visit_date,
            visit_status: item.visit_status.map(|s| s.as_str().to_string()),
            note: item.note,
            photo_ref: item.photo_ref,
            signing_month: item.signing_month.map(|m| m.to_string()),
            updated_by: item.updated_by,
            updated_at: item.updated_at,
        }
    }
}

/// One set of field values applied to every selected line item.
#[derive(Deserialize, ToSchema)]
pub struct BatchVisitUpdateRequest {
    pub line_item_ids: Vec<Uuid>,
    #[schema(value_type = Option<String>, example = "DONE")]
    pub status: Option<ContractStatus>,
    pub visit_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "VISITED")]
    pub visit_status: Option<VisitStatus>,
    pub note: Option<String>,
    /// Reference to a photo already stored by the upload service.
    pub photo_ref: Option<String>,
    #[schema(value_type = Option<String>, example = "2026-04")]
    pub signing_month: Option<SigningMonth>,
    pub updated_price: Option<AmountInput>,
}

impl BatchVisitUpdateRequest {
    fn to_submission(&self) -> VisitSubmission {
        VisitSubmission {
            status: self.status,
            visit_date: self.visit_date,
            visit_status: self.visit_status,
            note: self.note.clone(),
            photo_ref: self.photo_ref.clone(),
            signing_month: self.signing_month,
            updated_price: self.updated_price.as_ref().and_then(AmountInput::to_amount),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BatchVisitUpdateResponse {
    /// Number of line items changed, for display only.
    pub updated: u64,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Preview trimming and loss for a contract price and an updated price.
#[utoipa::path(
    post,
    path = "/reconciliation",
    request_body = ReconciliationRequest,
    responses(
        (status = 200, description = "Computed trimming and loss", body = ReconciliationResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn reconciliation_handler(
    Json(req): Json<ReconciliationRequest>,
) -> Json<ReconciliationResponse> {
    let result = reconciliation::compute(
        req.contract_price.as_ref().and_then(AmountInput::to_amount),
        req.updated_price.as_ref().and_then(AmountInput::to_amount),
    );
    Json(ReconciliationResponse {
        trimming: result.trimming,
        loss: result.loss,
    })
}

/// List the contract line items of a company.
#[utoipa::path(
    get,
    path = "/companies/{company_id}/line-items",
    params(("company_id" = Uuid, Path, description = "The client company.")),
    responses(
        (status = 200, description = "Line items of the company", body = [LineItemView]),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_line_items_handler(
    State(state): State<Arc<AppState>>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Vec<LineItemView>>, HandlerError> {
    let items = state.db.list_line_items(company_id).await.map_err(|e| {
        error!("Failed to list line items: {:?}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list line items")
    })?;
    Ok(Json(items.into_iter().map(LineItemView::from).collect()))
}

/// Apply one visit update to several line items of a company.
///
/// The update is validated before anything is written; a rejected update
/// leaves every row unchanged.
#[utoipa::path(
    post,
    path = "/companies/{company_id}/visits/batch",
    params(("company_id" = Uuid, Path, description = "The client company.")),
    request_body = BatchVisitUpdateRequest,
    responses(
        (status = 200, description = "Rows updated", body = BatchVisitUpdateResponse),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "Some line items do not belong to the company", body = ErrorResponse),
        (status = 422, description = "A required field is missing", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn batch_visit_update_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Path(company_id): Path<Uuid>,
    Json(req): Json<BatchVisitUpdateRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let updated = state
        .visits
        .apply_batch_update(caller, company_id, &req.line_item_ids, &req.to_submission())
        .await
        .map_err(|e| match e {
            BatchUpdateError::Validation(v) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    message: v.to_string(),
                    field: Some(v.field().to_string()),
                }),
            ),
            BatchUpdateError::UnknownLineItems { .. } => {
                error_response(StatusCode::NOT_FOUND, e.to_string())
            }
            BatchUpdateError::Port(e) => {
                error!("Failed to apply batch update: {:?}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update line items")
            }
        })?;

    Ok(Json(BatchVisitUpdateResponse { updated }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_utils::{body_text, test_state_with};
    use crm_dashboard_core::test_support::{line_item, MemoryDatabase};
    use rstest::rstest;

    fn caller() -> CallerIdentity {
        CallerIdentity {
            user_id: Uuid::new_v4(),
        }
    }

    fn batch_request(ids: Vec<Uuid>, status: ContractStatus) -> BatchVisitUpdateRequest {
        BatchVisitUpdateRequest {
            line_item_ids: ids,
            status: Some(status),
            visit_date: NaiveDate::from_ymd_opt(2026, 5, 20),
            visit_status: Some(VisitStatus::Visited),
            note: None,
            photo_ref: Some("photos/visit-2026-05-20.jpg".to_string()),
            signing_month: None,
            updated_price: Some(AmountInput::Text("900,000".to_string())),
        }
    }

    #[rstest]
    #[case(AmountInput::Number(1_000_000.0), AmountInput::Number(1_200_000.0), 200_000.0, 0.0)]
    #[case(AmountInput::Text("1,000,000".into()), AmountInput::Text("800,000".into()), 0.0, 200_000.0)]
    #[case(AmountInput::Number(1_000_000.0), AmountInput::Text("".into()), 0.0, 0.0)]
    #[case(AmountInput::Number(1_000_000.0), AmountInput::Text("n/a".into()), 0.0, 0.0)]
    #[case(AmountInput::Number(1_000.0), AmountInput::Text("-500".into()), 0.0, 0.0)]
    #[tokio::test]
    async fn reconciliation_preview(
        #[case] contract: AmountInput,
        #[case] updated: AmountInput,
        #[case] trimming: f64,
        #[case] loss: f64,
    ) {
        let Json(response) = reconciliation_handler(Json(ReconciliationRequest {
            contract_price: Some(contract),
            updated_price: Some(updated),
        }))
        .await;
        assert_eq!(response, ReconciliationResponse { trimming, loss });
    }

    #[test]
    fn amounts_deserialize_from_numbers_and_text() {
        let req: ReconciliationRequest =
            serde_json::from_str(r#"{"contract_price": 1000, "updated_price": "1,250"}"#).unwrap();
        assert_eq!(req.contract_price.unwrap().to_amount(), Some(1000.0));
        assert_eq!(req.updated_price.unwrap().to_amount(), Some(1250.0));
    }

    #[tokio::test]
    async fn batch_update_reports_affected_rows() {
        let company_id = Uuid::new_v4();
        let a = line_item(company_id, 1_000_000.0);
        let b = line_item(company_id, 600_000.0);
        let (state, db) =
            test_state_with(MemoryDatabase::with_line_items(vec![a.clone(), b.clone()]));

        let response = batch_visit_update_handler(
            State(state),
            Extension(caller()),
            Path(company_id),
            Json(batch_request(vec![a.id, b.id], ContractStatus::Negotiating)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"updated":2}"#);

        let rows = db.line_items();
        let row_a = rows.iter().find(|r| r.id == a.id).unwrap();
        let row_b = rows.iter().find(|r| r.id == b.id).unwrap();
        assert_eq!(row_a.loss_value, 100_000.0);
        assert_eq!(row_b.trimming_value, 300_000.0);
        assert_eq!(row_b.photo_ref.as_deref(), Some("photos/visit-2026-05-20.jpg"));
    }

    #[tokio::test]
    async fn done_without_signing_month_names_the_field() {
        let company_id = Uuid::new_v4();
        let item = line_item(company_id, 1_000_000.0);
        let (state, db) = test_state_with(MemoryDatabase::with_line_items(vec![item.clone()]));

        let response = batch_visit_update_handler(
            State(state),
            Extension(caller()),
            Path(company_id),
            Json(batch_request(vec![item.id], ContractStatus::Done)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["field"], "signing_month");
        assert_eq!(db.line_items()[0], item);
    }

    #[tokio::test]
    async fn negative_updated_price_names_the_field() {
        let company_id = Uuid::new_v4();
        let item = line_item(company_id, 1_000.0);
        let (state, db) = test_state_with(MemoryDatabase::with_line_items(vec![item.clone()]));
        let mut request = batch_request(vec![item.id], ContractStatus::Negotiating);
        request.updated_price = Some(AmountInput::Text("-500".to_string()));

        let response = batch_visit_update_handler(
            State(state),
            Extension(caller()),
            Path(company_id),
            Json(request),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["field"], "updated_price");
        assert_eq!(db.line_items()[0], item);
    }

    #[tokio::test]
    async fn foreign_line_items_are_not_found() {
        let company_id = Uuid::new_v4();
        let (state, _) = test_state_with(MemoryDatabase::with_line_items(vec![line_item(
            Uuid::new_v4(),
            10.0,
        )]));

        let response = batch_visit_update_handler(
            State(state),
            Extension(caller()),
            Path(company_id),
            Json(batch_request(vec![Uuid::new_v4()], ContractStatus::Waiting)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lists_only_the_company_line_items() {
        let company_id = Uuid::new_v4();
        let ours = line_item(company_id, 10.0);
        let (state, _) = test_state_with(MemoryDatabase::with_line_items(vec![
            ours.clone(),
            line_item(Uuid::new_v4(), 20.0),
        ]));

        let Json(items) = list_line_items_handler(State(state), Path(company_id))
            .await
            .unwrap_or_else(|_| panic!("listing failed"));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, ours.id);
    }

    #[test]
    fn openapi_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/auth/login",
            "/reconciliation",
            "/companies/{company_id}/visits/batch",
            "/analytics/contract-values",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "{expected}");
        }
    }
}
