use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::commission::round_currency;
use crate::geo::haversine_km;
use crate::models::job::{Job, JobStatus, Urgency};
use crate::models::vendor::Vendor;
use crate::state::AppState;

const EMERGENCY_SLA_MINUTES: i64 = 15;
const URGENT_SLA_MINUTES: i64 = 30;
const STANDARD_SLA_MINUTES: i64 = 45;
const SEVERE_OVERDUE_MINUTES: i64 = 10;

const BACKLOG_WEIGHT: f64 = 2.0;
const PAUSED_PENALTY: f64 = 5.0;
const MAX_SUGGESTIONS: usize = 5;

pub fn sla_budget_minutes(urgency: Urgency) -> i64 {
    match urgency {
        Urgency::Emergency => EMERGENCY_SLA_MINUTES,
        Urgency::Urgent => URGENT_SLA_MINUTES,
        Urgency::Standard => STANDARD_SLA_MINUTES,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlaStatus {
    pub budget_minutes: i64,
    pub open_minutes: i64,
    pub minutes_remaining: i64,
    pub at_risk: bool,
    pub severe: bool,
}

pub fn assess(job: &Job, now: DateTime<Utc>) -> SlaStatus {
    let budget_minutes = sla_budget_minutes(job.urgency);
    let open_minutes = (now - job.created_at).num_minutes();
    let minutes_remaining = budget_minutes - open_minutes;

    SlaStatus {
        budget_minutes,
        open_minutes,
        minutes_remaining,
        at_risk: minutes_remaining <= 0,
        severe: minutes_remaining <= -SEVERE_OVERDUE_MINUTES,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub job_id: Uuid,
    pub service: String,
    pub status: JobStatus,
    pub urgency: Urgency,
    pub vendor_name: Option<String>,
    pub escalated: bool,
    #[serde(flatten)]
    pub sla: SlaStatus,
}

fn queue_entry(job: &Job, now: DateTime<Utc>) -> QueueEntry {
    QueueEntry {
        job_id: job.id,
        service: job.service.clone(),
        status: job.status,
        urgency: job.urgency,
        vendor_name: job.vendor_name.clone(),
        escalated: job.escalated_at.is_some(),
        sla: assess(job, now),
    }
}

pub fn open_job_queue(state: &AppState, now: DateTime<Utc>) -> Vec<QueueEntry> {
    let mut queue: Vec<QueueEntry> = state
        .jobs
        .iter()
        .filter(|entry| entry.value().status != JobStatus::Completed)
        .map(|entry| queue_entry(entry.value(), now))
        .collect();

    queue.sort_by_key(|entry| entry.sla.minutes_remaining);
    queue
}

/// Most overdue first: at-risk or already-escalated open jobs, ascending by
/// minutes remaining.
pub fn escalation_queue(state: &AppState, now: DateTime<Utc>) -> Vec<QueueEntry> {
    let mut queue: Vec<QueueEntry> = state
        .jobs
        .iter()
        .filter(|entry| entry.value().status != JobStatus::Completed)
        .map(|entry| queue_entry(entry.value(), now))
        .filter(|entry| entry.sla.at_risk || entry.escalated)
        .collect();

    queue.sort_by_key(|entry| entry.sla.minutes_remaining);
    queue
}

pub fn vendor_backlog(state: &AppState, vendor_id: Uuid) -> usize {
    state
        .jobs
        .iter()
        .filter(|entry| {
            let job = entry.value();
            job.vendor_id == Some(vendor_id) && job.status != JobStatus::Completed
        })
        .count()
}

#[derive(Debug, Clone, Serialize)]
pub struct VendorSuggestion {
    pub vendor_id: Uuid,
    pub name: String,
    pub phone: String,
    pub distance_km: f64,
    pub backlog: usize,
    pub updates_paused: bool,
    pub score: f64,
}

/// Ranks active vendors with resolvable coordinates for an unassigned job:
/// score = distance + 2 x backlog + 5 if paused, five lowest win.
pub fn rank_vendors(state: &AppState, job: &Job) -> Vec<VendorSuggestion> {
    let Some(pickup) = job.pickup else {
        return Vec::new();
    };

    let mut suggestions: Vec<VendorSuggestion> = state
        .vendors
        .iter()
        .filter_map(|entry| {
            let vendor = entry.value();
            if !vendor.active {
                return None;
            }
            let location = vendor.location?;

            let distance_km = haversine_km(&location, &pickup);
            let backlog = vendor_backlog(state, vendor.id);
            let mut score = distance_km + BACKLOG_WEIGHT * backlog as f64;
            if vendor.updates_paused {
                score += PAUSED_PENALTY;
            }

            Some(VendorSuggestion {
                vendor_id: vendor.id,
                name: vendor.name.clone(),
                phone: vendor.phone.clone(),
                distance_km,
                backlog,
                updates_paused: vendor.updates_paused,
                score,
            })
        })
        .collect();

    suggestions.sort_by(|a, b| a.score.total_cmp(&b.score));
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

#[derive(Debug, Clone, Serialize)]
pub struct VendorScorecard {
    pub vendor_id: Uuid,
    pub name: String,
    pub assigned: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub avg_arrival_minutes: Option<f64>,
    pub avg_completion_minutes: Option<f64>,
    pub sla_hit_rate: Option<f64>,
    pub avg_rating: Option<f64>,
    pub gross_total: f64,
    pub commission_total: f64,
}

pub fn vendor_scorecard(
    state: &AppState,
    vendor: &Vendor,
    window_days: i64,
    now: DateTime<Utc>,
) -> VendorScorecard {
    let window_start = now - Duration::days(window_days);

    let mut assigned = 0;
    let mut completed = 0;
    let mut cancelled = 0;
    let mut arrival_minutes = Vec::new();
    let mut completion_minutes = Vec::new();
    let mut sla_hits = 0usize;
    let mut sla_measured = 0usize;
    let mut ratings = Vec::new();
    let mut gross_total = 0.0;
    let mut commission_total = 0.0;

    for entry in state.jobs.iter() {
        let job = entry.value();
        if job.created_at < window_start {
            continue;
        }

        if job.prior_vendor_ids.contains(&vendor.id) {
            cancelled += 1;
        }
        if job.vendor_id != Some(vendor.id) {
            continue;
        }
        if job.assigned_at.is_some() {
            assigned += 1;
        }

        if let (Some(assigned_at), Some(arrived_at)) = (job.assigned_at, job.arrived_at) {
            arrival_minutes.push((arrived_at - assigned_at).num_minutes() as f64);
        }
        if let Some(arrived_at) = job.arrived_at {
            sla_measured += 1;
            let budget = sla_budget_minutes(job.urgency);
            if (arrived_at - job.created_at).num_minutes() <= budget {
                sla_hits += 1;
            }
        }

        if job.status == JobStatus::Completed {
            completed += 1;
            if let (Some(assigned_at), Some(completed_at)) = (job.assigned_at, job.completed_at) {
                completion_minutes.push((completed_at - assigned_at).num_minutes() as f64);
            }
            if let Some(payment) = &job.reported_payment {
                gross_total += payment.amount;
            }
            if let Some(commission) = &job.commission {
                commission_total += commission.amount;
            }
        }

        if let Some(rating) = job.customer_rating {
            ratings.push(rating);
        }
    }

    let mean = |values: &[f64]| {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    VendorScorecard {
        vendor_id: vendor.id,
        name: vendor.name.clone(),
        assigned,
        completed,
        cancelled,
        avg_arrival_minutes: mean(&arrival_minutes),
        avg_completion_minutes: mean(&completion_minutes),
        sla_hit_rate: (sla_measured > 0).then(|| sla_hits as f64 / sla_measured as f64),
        avg_rating: mean(&ratings),
        gross_total: round_currency(gross_total),
        commission_total: round_currency(commission_total),
    }
}
