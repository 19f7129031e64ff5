//! crates/crm_dashboard_core/src/reconciliation.rs
//!
//! Derives trimming and loss values from a contract price and an updated
//! (renegotiated) price. Everything here is a pure function of its inputs.

use crate::domain::Reconciliation;

/// Computes trimming and loss for one price pair.
///
/// An absent, zero, negative or non-finite updated price, or a contract price
/// that is not a finite positive number, yields zero for both values.
pub fn compute(contract_price: Option<f64>, updated_price: Option<f64>) -> Reconciliation {
    let Some(updated) = updated_price.filter(|p| p.is_finite() && *p > 0.0) else {
        return Reconciliation::default();
    };
    let Some(contract) = contract_price.filter(|p| p.is_finite() && *p > 0.0) else {
        return Reconciliation::default();
    };

    if updated > contract {
        Reconciliation {
            trimming: updated - contract,
            loss: 0.0,
        }
    } else if updated < contract {
        Reconciliation {
            trimming: 0.0,
            loss: contract - updated,
        }
    } else {
        Reconciliation::default()
    }
}

/// Parses an amount typed into a form, accepting `1,200,000`, `1 200 000`
/// and `1_200_000`. Blank or malformed input is `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '_'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
