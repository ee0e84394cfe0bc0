use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Settlement record for a completed job. Stored keyed on `job_id`, so there
/// is exactly one row per job no matter how often settlement runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionCharge {
    pub id: Uuid,
    pub job_id: Uuid,
    pub vendor_id: Uuid,
    pub reported_amount: f64,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub status: ChargeStatus,
    pub processor: String,
    pub processor_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
