use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::{lifecycle, settlement};
use crate::error::AppError;
use crate::models::charge::CommissionCharge;
use crate::models::event::DispatchEvent;
use crate::models::job::{BidMode, CustomerRef, Job, JobStatus, Urgency};
use crate::models::vendor::GeoPoint;
use crate::notify::{dispatch_notification, Channel};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/:id", get(get_job).patch(update_job))
        .route("/jobs/:id/complete", post(complete_job))
        .route("/jobs/:id/escalate", post(escalate_job))
        .route("/jobs/:id/retry-charge", post(retry_charge))
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub customer: CustomerRef,
    pub service: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub bid_mode: BidMode,
    #[serde(default)]
    pub quoted_price: Option<f64>,
    #[serde(default)]
    pub pickup: Option<GeoPoint>,
    #[serde(default)]
    pub dropoff: Option<GeoPoint>,
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<Json<Job>, AppError> {
    if payload.customer.name.trim().is_empty() {
        return Err(AppError::BadRequest("customer name cannot be empty".to_string()));
    }
    if payload.customer.phone.trim().is_empty() {
        return Err(AppError::BadRequest("customer phone cannot be empty".to_string()));
    }
    if payload.service.trim().is_empty() {
        return Err(AppError::BadRequest("service cannot be empty".to_string()));
    }
    if let Some(price) = payload.quoted_price {
        if !price.is_finite() || price < 0.0 {
            return Err(AppError::BadRequest("quoted_price must be non-negative".to_string()));
        }
    }
    if payload.bid_mode == BidMode::Fixed && payload.quoted_price.is_none() {
        return Err(AppError::BadRequest(
            "fixed bid mode requires a quoted_price".to_string(),
        ));
    }

    let job = Job::new(
        payload.customer,
        payload.service,
        payload.urgency,
        payload.bid_mode,
        payload.quoted_price,
        payload.pickup,
        payload.dropoff,
    );

    state.jobs.insert(job.id, job.clone());
    tracing::info!(job_id = %job.id, service = %job.service, "job created");

    Ok(Json(job))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<Job>> {
    let mut jobs: Vec<Job> = state.jobs.iter().map(|entry| entry.value().clone()).collect();
    jobs.sort_by_key(|job| std::cmp::Reverse(job.created_at));
    Json(jobs)
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .jobs
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

    Ok(Json(job.value().clone()))
}

#[derive(Deserialize)]
pub struct UpdateJobRequest {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub vendor_id: Option<Uuid>,
    #[serde(default)]
    pub urgency: Option<Urgency>,
    #[serde(default)]
    pub quoted_price: Option<f64>,
    #[serde(default)]
    pub customer_rating: Option<f64>,
}

async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> Result<Json<Job>, AppError> {
    let now = Utc::now();

    let vendor = match payload.vendor_id {
        Some(vendor_id) => Some(
            state
                .vendors
                .get(&vendor_id)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| AppError::NotFound(format!("vendor {vendor_id} not found")))?,
        ),
        None => None,
    };

    let (job, status_change) = {
        let mut job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;
        let from = job.status;

        if let Some(vendor) = vendor {
            if job.selected_bid_id.is_some() && job.vendor_id != Some(vendor.id) {
                return Err(AppError::Conflict(
                    "job is locked to a selected bid; unassign it first".to_string(),
                ));
            }
            if let Some(previous) = job.vendor_id {
                if previous != vendor.id {
                    job.prior_vendor_ids.push(previous);
                }
            }
            job.vendor_id = Some(vendor.id);
            job.vendor_name = Some(vendor.name);
            job.vendor_phone = Some(vendor.phone);
            job.bidding_open = false;
            if job.status == JobStatus::Unassigned {
                lifecycle::transition(&mut *job, JobStatus::Assigned, now)?;
            }
        }

        if let Some(status) = payload.status {
            lifecycle::transition(&mut *job, status, now)?;
        }
        if let Some(urgency) = payload.urgency {
            job.urgency = urgency;
        }
        if let Some(price) = payload.quoted_price {
            if !price.is_finite() || price < 0.0 {
                return Err(AppError::BadRequest("quoted_price must be non-negative".to_string()));
            }
            job.quoted_price = Some(price);
        }
        if let Some(rating) = payload.customer_rating {
            job.customer_rating = Some(rating.clamp(0.0, 5.0));
        }
        job.updated_at = now;

        let to = job.status;
        (job.clone(), (from != to).then_some((from, to)))
    };

    if let Some((from, to)) = status_change {
        state.publish(DispatchEvent::StatusChanged {
            job_id: job.id,
            from,
            to,
        });
        tracing::info!(job_id = %job.id, %from, %to, "job status changed");
    }

    Ok(Json(job))
}

async fn complete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<settlement::CompletionRequest>,
) -> Result<Json<Job>, AppError> {
    let job = settlement::complete_job(&state, id, payload).await?;
    Ok(Json(job))
}

async fn escalate_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let job = {
        let mut job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

        if job.status == JobStatus::Completed {
            return Err(AppError::Conflict("completed jobs cannot be escalated".to_string()));
        }
        if job.escalated_at.is_none() {
            job.escalated_at = Some(Utc::now());
        }
        job.updated_at = Utc::now();
        job.clone()
    };

    state.publish(DispatchEvent::JobEscalated { job_id: job.id });
    dispatch_notification(
        &state,
        Channel::Push,
        "dispatch",
        &format!("Job {} ({}) needs attention", job.id, job.service),
        Some(job.id),
    )
    .await;

    Ok(Json(job))
}

async fn retry_charge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommissionCharge>, AppError> {
    let charge = settlement::charge_commission(&state, id)?;
    Ok(Json(charge))
}
