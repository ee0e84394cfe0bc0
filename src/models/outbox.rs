use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notify::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Queued,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub kind: Channel,
    pub recipient: String,
    pub body: String,
    pub job_id: Option<Uuid>,
    pub status: OutboxStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
