use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::vendor::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Unassigned,
    Assigned,
    OnTheWay,
    Arrived,
    Completed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Unassigned => write!(f, "Unassigned"),
            JobStatus::Assigned => write!(f, "Assigned"),
            JobStatus::OnTheWay => write!(f, "OnTheWay"),
            JobStatus::Arrived => write!(f, "Arrived"),
            JobStatus::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Emergency,
    Urgent,
    Standard,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Standard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidMode {
    Open,
    Fixed,
}

impl Default for BidMode {
    fn default() -> Self {
        BidMode::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Charged,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRef {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportedPayment {
    pub amount: f64,
    pub method: String,
    pub note: Option<String>,
    pub actor: Option<String>,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionBlock {
    pub rate: f64,
    pub amount: f64,
    pub status: CommissionStatus,
    pub charged_at: Option<DateTime<Utc>>,
    pub charge_id: Option<Uuid>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFlags {
    pub under_report: bool,
    pub under_report_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobTokens {
    pub bidding: Option<String>,
    pub customer: Option<String>,
    pub acceptance: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub customer: CustomerRef,
    pub service: String,
    pub urgency: Urgency,
    pub status: JobStatus,
    pub bid_mode: BidMode,
    pub bidding_open: bool,
    pub selected_bid_id: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub vendor_name: Option<String>,
    pub vendor_phone: Option<String>,
    pub prior_vendor_ids: Vec<Uuid>,
    pub quoted_price: Option<f64>,
    pub final_price: Option<f64>,
    pub expected_revenue: Option<f64>,
    pub reported_payment: Option<ReportedPayment>,
    pub commission: Option<CommissionBlock>,
    pub flags: JobFlags,
    pub customer_rating: Option<f64>,
    pub pickup: Option<GeoPoint>,
    pub dropoff: Option<GeoPoint>,
    pub tokens: JobTokens,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub on_the_way_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        customer: CustomerRef,
        service: String,
        urgency: Urgency,
        bid_mode: BidMode,
        quoted_price: Option<f64>,
        pickup: Option<GeoPoint>,
        dropoff: Option<GeoPoint>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer,
            service,
            urgency,
            status: JobStatus::Unassigned,
            bid_mode,
            bidding_open: false,
            selected_bid_id: None,
            vendor_id: None,
            vendor_name: None,
            vendor_phone: None,
            prior_vendor_ids: Vec::new(),
            quoted_price,
            final_price: None,
            expected_revenue: None,
            reported_payment: None,
            commission: None,
            flags: JobFlags::default(),
            customer_rating: None,
            pickup,
            dropoff,
            tokens: JobTokens::default(),
            created_at: now,
            assigned_at: None,
            on_the_way_at: None,
            arrived_at: None,
            completed_at: None,
            escalated_at: None,
            updated_at: now,
        }
    }
}
