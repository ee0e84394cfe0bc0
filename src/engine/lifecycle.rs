use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::job::{Job, JobStatus};

fn forward_targets(from: JobStatus) -> &'static [JobStatus] {
    match from {
        JobStatus::Unassigned => &[JobStatus::Assigned],
        JobStatus::Assigned => &[
            JobStatus::OnTheWay,
            JobStatus::Arrived,
            JobStatus::Completed,
            JobStatus::Unassigned,
        ],
        JobStatus::OnTheWay => &[JobStatus::Arrived, JobStatus::Completed],
        JobStatus::Arrived => &[JobStatus::Completed],
        JobStatus::Completed => &[],
    }
}

fn rollback_target(from: JobStatus) -> Option<JobStatus> {
    match from {
        JobStatus::Unassigned => None,
        JobStatus::Assigned => Some(JobStatus::Unassigned),
        JobStatus::OnTheWay => Some(JobStatus::Assigned),
        JobStatus::Arrived => Some(JobStatus::OnTheWay),
        JobStatus::Completed => Some(JobStatus::Arrived),
    }
}

pub fn is_allowed(from: JobStatus, to: JobStatus) -> bool {
    from == to || forward_targets(from).contains(&to) || rollback_target(from) == Some(to)
}

/// Moves the job to `to`, stamping entry timestamps. Stamps are set-once so
/// rollback followed by re-advance keeps the original SLA history.
pub fn transition(job: &mut Job, to: JobStatus, now: DateTime<Utc>) -> Result<(), AppError> {
    let from = job.status;
    if !is_allowed(from, to) {
        return Err(AppError::Conflict(format!(
            "illegal status transition {from} -> {to}"
        )));
    }

    job.status = to;
    match to {
        JobStatus::Unassigned => {
            if let Some(vendor_id) = job.vendor_id.take() {
                job.prior_vendor_ids.push(vendor_id);
            }
            job.vendor_name = None;
            job.vendor_phone = None;
            job.selected_bid_id = None;
            job.bidding_open = true;
        }
        JobStatus::Assigned => {
            if job.assigned_at.is_none() {
                job.assigned_at = Some(now);
            }
        }
        JobStatus::OnTheWay => {
            if job.on_the_way_at.is_none() {
                job.on_the_way_at = Some(now);
            }
        }
        JobStatus::Arrived => {
            if job.arrived_at.is_none() {
                job.arrived_at = Some(now);
            }
        }
        JobStatus::Completed => {
            if job.completed_at.is_none() {
                job.completed_at = Some(now);
            }
        }
    }
    job.updated_at = now;

    Ok(())
}
