use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingProfile {
    pub processor_customer_id: Option<String>,
    pub default_payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub location: Option<GeoPoint>,
    pub active: bool,
    pub updates_paused: bool,
    pub services: Vec<String>,
    pub heavy_duty: bool,
    pub billing: BillingProfile,
    pub compliance_ok: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
