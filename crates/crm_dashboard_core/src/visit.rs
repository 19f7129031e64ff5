//! crates/crm_dashboard_core/src/visit.rs
//!
//! Validation and batch application of visit updates. A batch applies one
//! set of field values to several contract line items of the same company.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{CallerIdentity, ContractStatus, Reconciliation, SigningMonth, VisitStatus};
use crate::ports::{DatabaseService, PortError};
use crate::reconciliation;

/// The form a user submits for a batch of line items. Every field may be
/// missing; [`validate_submission`] decides whether it is complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitSubmission {
    pub status: Option<ContractStatus>,
    pub visit_date: Option<NaiveDate>,
    pub visit_status: Option<VisitStatus>,
    pub note: Option<String>,
    pub photo_ref: Option<String>,
    pub signing_month: Option<SigningMonth>,
    pub updated_price: Option<f64>,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedVisitUpdate {
    pub status: ContractStatus,
    pub visit_date: NaiveDate,
    pub visit_status: VisitStatus,
    pub note: Option<String>,
    pub photo_ref: Option<String>,
    pub signing_month: Option<SigningMonth>,
    pub updated_price: Option<f64>,
}

/// The write for one line item: the shared update plus that row's reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemWrite {
    pub line_item_id: Uuid,
    pub update: AcceptedVisitUpdate,
    pub reconciliation: Reconciliation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("status is required")]
    MissingStatus,
    #[error("visit date is required")]
    MissingVisitDate,
    #[error("visit status is required")]
    MissingVisitStatus,
    #[error("signing month is required when status is DONE")]
    MissingSigningMonth,
    #[error("updated price must be a non-negative amount")]
    InvalidUpdatedPrice,
    #[error("at least one line item must be selected")]
    EmptySelection,
}

impl ValidationError {
    /// The form field the user has to correct.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingStatus => "status",
            ValidationError::MissingVisitDate => "visit_date",
            ValidationError::MissingVisitStatus => "visit_status",
            ValidationError::MissingSigningMonth => "signing_month",
            ValidationError::InvalidUpdatedPrice => "updated_price",
            ValidationError::EmptySelection => "line_item_ids",
        }
    }
}

/// Checks the required fields of a submission, in form order.
pub fn validate_submission(
    submission: &VisitSubmission,
) -> Result<AcceptedVisitUpdate, ValidationError> {
    let status = submission.status.ok_or(ValidationError::MissingStatus)?;
    let visit_date = submission
        .visit_date
        .ok_or(ValidationError::MissingVisitDate)?;
    let visit_status = submission
        .visit_status
        .ok_or(ValidationError::MissingVisitStatus)?;
    if status.is_terminal() && submission.signing_month.is_none() {
        return Err(ValidationError::MissingSigningMonth);
    }
    if submission
        .updated_price
        .is_some_and(|p| !p.is_finite() || p < 0.0)
    {
        return Err(ValidationError::InvalidUpdatedPrice);
    }

    Ok(AcceptedVisitUpdate {
        status,
        visit_date,
        visit_status,
        note: submission
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        photo_ref: submission.photo_ref.clone(),
        signing_month: submission.signing_month,
        updated_price: submission.updated_price,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum BatchUpdateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("line items not found for company {company_id}: {missing:?}")]
    UnknownLineItems { company_id: Uuid, missing: Vec<Uuid> },
    #[error(transparent)]
    Port(#[from] PortError),
}

//=========================================================================================
// VisitService
//=========================================================================================

/// Applies validated visit updates to contract line items.
#[derive(Clone)]
pub struct VisitService {
    db: Arc<dyn DatabaseService>,
}

impl VisitService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Validates `submission` and applies it to every selected line item.
    ///
    /// Nothing is written unless the submission is valid and every id belongs
    /// to `company_id`. Returns the number of rows updated.
    pub async fn apply_batch_update(
        &self,
        caller: CallerIdentity,
        company_id: Uuid,
        line_item_ids: &[Uuid],
        submission: &VisitSubmission,
    ) -> Result<u64, BatchUpdateError> {
        let update = validate_submission(submission)?;

        let mut seen = HashSet::new();
        let selected: Vec<Uuid> = line_item_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if selected.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }

        let items = self.db.get_line_items(company_id, &selected).await?;
        let found: HashSet<Uuid> = items.iter().map(|item| item.id).collect();
        let missing: Vec<Uuid> = selected
            .iter()
            .copied()
            .filter(|id| !found.contains(id))
            .collect();
        if !missing.is_empty() {
            warn!(%company_id, ?missing, "Batch update references unknown line items");
            return Err(BatchUpdateError::UnknownLineItems {
                company_id,
                missing,
            });
        }

        let writes: Vec<LineItemWrite> = items
            .iter()
            .map(|item| LineItemWrite {
                line_item_id: item.id,
                update: update.clone(),
                reconciliation: reconciliation::compute(
                    Some(item.contract_price),
                    update.updated_price,
                ),
            })
            .collect();

        let updated = self
            .db
            .apply_line_item_writes(caller, company_id, &writes)
            .await?;
        info!(
            %company_id,
            user_id = %caller.user_id,
            updated,
            status = update.status.as_str(),
            "Applied batch visit update"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{line_item, MemoryDatabase};
    use rstest::rstest;

    fn complete_submission(status: ContractStatus) -> VisitSubmission {
        VisitSubmission {
            status: Some(status),
            visit_date: NaiveDate::from_ymd_opt(2026, 3, 14),
            visit_status: Some(VisitStatus::Visited),
            note: Some("  met the purchasing lead ".to_string()),
            photo_ref: None,
            signing_month: None,
            updated_price: Some(1_200_000.0),
        }
    }

    #[test]
    fn done_without_signing_month_is_rejected() {
        let submission = complete_submission(ContractStatus::Done);
        assert_eq!(
            validate_submission(&submission),
            Err(ValidationError::MissingSigningMonth)
        );
    }

    #[test]
    fn done_with_signing_month_is_accepted() {
        let mut submission = complete_submission(ContractStatus::Done);
        submission.signing_month = SigningMonth::new(2026, 4);
        let accepted = validate_submission(&submission).unwrap();
        assert_eq!(accepted.signing_month, SigningMonth::new(2026, 4));
        assert_eq!(accepted.note.as_deref(), Some("met the purchasing lead"));
    }

    #[test]
    fn waiting_without_signing_month_is_accepted() {
        let submission = complete_submission(ContractStatus::Waiting);
        assert!(validate_submission(&submission).is_ok());
    }

    #[rstest]
    #[case::no_status(|s: &mut VisitSubmission| s.status = None, ValidationError::MissingStatus)]
    #[case::no_date(|s: &mut VisitSubmission| s.visit_date = None, ValidationError::MissingVisitDate)]
    #[case::no_visit_status(
        |s: &mut VisitSubmission| s.visit_status = None,
        ValidationError::MissingVisitStatus
    )]
    fn missing_required_fields_are_rejected(
        #[case] strip: fn(&mut VisitSubmission),
        #[case] expected: ValidationError,
    ) {
        let mut submission = complete_submission(ContractStatus::InProgress);
        strip(&mut submission);
        assert_eq!(validate_submission(&submission), Err(expected));
    }

    #[rstest]
    #[case(-500.0)]
    #[case(f64::INFINITY)]
    fn unusable_updated_price_is_rejected(#[case] price: f64) {
        let mut submission = complete_submission(ContractStatus::Negotiating);
        submission.updated_price = Some(price);
        let err = validate_submission(&submission).unwrap_err();
        assert_eq!(err, ValidationError::InvalidUpdatedPrice);
        assert_eq!(err.field(), "updated_price");
    }

    #[test]
    fn zero_updated_price_is_accepted() {
        let mut submission = complete_submission(ContractStatus::Negotiating);
        submission.updated_price = Some(0.0);
        assert!(validate_submission(&submission).is_ok());
    }

    #[test]
    fn status_is_checked_before_other_fields() {
        let submission = VisitSubmission::default();
        assert_eq!(
            validate_submission(&submission),
            Err(ValidationError::MissingStatus)
        );
    }

    #[tokio::test]
    async fn batch_update_applies_same_fields_with_per_row_reconciliation() {
        let company_id = Uuid::new_v4();
        let a = line_item(company_id, 1_000_000.0);
        let b = line_item(company_id, 1_500_000.0);
        let db = Arc::new(MemoryDatabase::with_line_items(vec![a.clone(), b.clone()]));
        let service = VisitService::new(db.clone());
        let caller = CallerIdentity {
            user_id: Uuid::new_v4(),
        };

        let updated = service
            .apply_batch_update(
                caller,
                company_id,
                &[a.id, b.id, a.id],
                &complete_submission(ContractStatus::Negotiating),
            )
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let rows = db.line_items();
        let row_a = rows.iter().find(|r| r.id == a.id).unwrap();
        let row_b = rows.iter().find(|r| r.id == b.id).unwrap();
        assert_eq!(row_a.status, Some(ContractStatus::Negotiating));
        assert_eq!(row_b.status, Some(ContractStatus::Negotiating));
        assert_eq!(row_a.trimming_value, 200_000.0);
        assert_eq!(row_a.loss_value, 0.0);
        assert_eq!(row_b.trimming_value, 0.0);
        assert_eq!(row_b.loss_value, 300_000.0);
        assert_eq!(row_a.updated_by, Some(caller.user_id));
    }

    #[tokio::test]
    async fn invalid_batch_writes_nothing() {
        let company_id = Uuid::new_v4();
        let item = line_item(company_id, 1_000_000.0);
        let db = Arc::new(MemoryDatabase::with_line_items(vec![item.clone()]));
        let service = VisitService::new(db.clone());
        let caller = CallerIdentity {
            user_id: Uuid::new_v4(),
        };

        let err = service
            .apply_batch_update(
                caller,
                company_id,
                &[item.id],
                &complete_submission(ContractStatus::Done),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BatchUpdateError::Validation(ValidationError::MissingSigningMonth)
        ));
        assert_eq!(db.line_items()[0], item);
    }

    #[tokio::test]
    async fn negative_updated_price_writes_nothing() {
        let company_id = Uuid::new_v4();
        let item = line_item(company_id, 1_000.0);
        let db = Arc::new(MemoryDatabase::with_line_items(vec![item.clone()]));
        let service = VisitService::new(db.clone());
        let caller = CallerIdentity {
            user_id: Uuid::new_v4(),
        };
        let mut submission = complete_submission(ContractStatus::Negotiating);
        submission.updated_price = Some(-500.0);

        let err = service
            .apply_batch_update(caller, company_id, &[item.id], &submission)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BatchUpdateError::Validation(ValidationError::InvalidUpdatedPrice)
        ));
        assert_eq!(db.line_items()[0], item);
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let db = Arc::new(MemoryDatabase::default());
        let service = VisitService::new(db);
        let caller = CallerIdentity {
            user_id: Uuid::new_v4(),
        };

        let err = service
            .apply_batch_update(
                caller,
                Uuid::new_v4(),
                &[],
                &complete_submission(ContractStatus::Waiting),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BatchUpdateError::Validation(ValidationError::EmptySelection)
        ));
    }

    #[tokio::test]
    async fn line_items_of_other_companies_are_refused() {
        let company_id = Uuid::new_v4();
        let ours = line_item(company_id, 500.0);
        let theirs = line_item(Uuid::new_v4(), 500.0);
        let db = Arc::new(MemoryDatabase::with_line_items(vec![
            ours.clone(),
            theirs.clone(),
        ]));
        let service = VisitService::new(db.clone());
        let caller = CallerIdentity {
            user_id: Uuid::new_v4(),
        };

        let err = service
            .apply_batch_update(
                caller,
                company_id,
                &[ours.id, theirs.id],
                &complete_submission(ContractStatus::Waiting),
            )
            .await
            .unwrap_err();
        match err {
            BatchUpdateError::UnknownLineItems { missing, .. } => {
                assert_eq!(missing, vec![theirs.id]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(db.line_items()[0], ours);
    }
}
