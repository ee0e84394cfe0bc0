use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Composite store key enforcing one bid per vendor per job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BidKey {
    pub job_id: Uuid,
    pub vendor_key: String,
}

impl BidKey {
    pub fn new(job_id: Uuid, vendor_id: Option<Uuid>, phone: &str) -> Self {
        let vendor_key = match vendor_id {
            Some(id) => format!("v:{id}"),
            None => format!("p:{}", phone.trim()),
        };
        Self { job_id, vendor_key }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub job_id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub vendor_name: String,
    pub vendor_phone: String,
    pub eta_minutes: i64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer-facing projection: nothing beyond name/phone identifies the vendor.
#[derive(Debug, Clone, Serialize)]
pub struct BidView {
    pub id: Uuid,
    pub vendor_name: String,
    pub vendor_phone: String,
    pub eta_minutes: i64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

impl From<&Bid> for BidView {
    fn from(bid: &Bid) -> Self {
        Self {
            id: bid.id,
            vendor_name: bid.vendor_name.clone(),
            vendor_phone: bid.vendor_phone.clone(),
            eta_minutes: bid.eta_minutes,
            price: bid.price,
            created_at: bid.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Bidding,
    Customer,
    Acceptance,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub token: String,
    pub job_id: Uuid,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
}
