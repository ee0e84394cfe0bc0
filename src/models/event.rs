use serde::Serialize;
use uuid::Uuid;

use crate::models::job::JobStatus;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    BidSubmitted {
        job_id: Uuid,
        vendor_name: String,
        eta_minutes: i64,
        price: f64,
    },
    VendorAssigned {
        job_id: Uuid,
        vendor_name: String,
    },
    StatusChanged {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
    JobCompleted {
        job_id: Uuid,
        amount: f64,
        commission_status: String,
    },
    JobEscalated {
        job_id: Uuid,
    },
}
