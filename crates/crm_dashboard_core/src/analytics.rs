//! crates/crm_dashboard_core/src/analytics.rs
//!
//! Aggregations behind the dashboard charts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{ContractLineItem, ContractStatus, ParseLabelError, VisitStatus};

pub const UNASSIGNED: &str = "UNASSIGNED";

/// The field contract values are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Status,
    Quadrant,
    Certification,
}

impl FromStr for Dimension {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(Dimension::Status),
            "quadrant" => Ok(Dimension::Quadrant),
            "certification" => Ok(Dimension::Certification),
            other => Err(ParseLabelError {
                kind: "dimension",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractValueBucket {
    pub key: String,
    pub item_count: usize,
    pub total_contract_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMemberPerformance {
    pub user_id: Uuid,
    pub visits_logged: usize,
    pub deals_done: usize,
    pub total_trimming: f64,
    pub total_loss: f64,
}

fn bucket_key(item: &ContractLineItem, dimension: Dimension) -> String {
    let key = match dimension {
        Dimension::Status => item.status.map(|s| s.as_str().to_string()),
        Dimension::Quadrant => item.quadrant.map(|q| q.as_str().to_string()),
        Dimension::Certification => item
            .certification_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase),
    };
    key.unwrap_or_else(|| UNASSIGNED.to_string())
}

/// Sums contract values per key of `dimension`, largest total first.
pub fn aggregate_contract_values(
    items: &[ContractLineItem],
    dimension: Dimension,
) -> Vec<ContractValueBucket> {
    let mut buckets: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for item in items {
        let slot = buckets.entry(bucket_key(item, dimension)).or_default();
        slot.0 += 1;
        slot.1 += item.contract_price;
    }

    let mut result: Vec<ContractValueBucket> = buckets
        .into_iter()
        .map(|(key, (item_count, total))| ContractValueBucket {
            key,
            item_count,
            total_contract_value: total,
        })
        .collect();
    result.sort_by(|a, b| {
        b.total_contract_value
            .total_cmp(&a.total_contract_value)
            .then_with(|| a.key.cmp(&b.key))
    });
    result
}

/// Per-user totals over the line items each user last updated.
pub fn team_performance(items: &[ContractLineItem]) -> Vec<TeamMemberPerformance> {
    let mut per_user: HashMap<Uuid, TeamMemberPerformance> = HashMap::new();
    for item in items {
        let Some(user_id) = item.updated_by else {
            continue;
        };
        let row = per_user
            .entry(user_id)
            .or_insert_with(|| TeamMemberPerformance {
                user_id,
                visits_logged: 0,
                deals_done: 0,
                total_trimming: 0.0,
                total_loss: 0.0,
            });
        if item.visit_status == Some(VisitStatus::Visited) {
            row.visits_logged += 1;
        }
        if item.status == Some(ContractStatus::Done) {
            row.deals_done += 1;
        }
        row.total_trimming += item.trimming_value;
        row.total_loss += item.loss_value;
    }

    let mut result: Vec<TeamMemberPerformance> = per_user.into_values().collect();
    result.sort_by(|a, b| {
        b.deals_done
            .cmp(&a.deals_done)
            .then_with(|| b.visits_logged.cmp(&a.visits_logged))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    result
}
