use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::scoring::{self, QueueEntry, VendorScorecard, VendorSuggestion};
use crate::models::charge::CommissionCharge;
use crate::models::job::JobStatus;
use crate::models::outbox::OutboxEntry;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ops/mission-control", get(mission_control))
        .route("/ops/outbox", get(list_outbox))
        .route("/ops/charges", get(list_charges))
}

#[derive(Serialize)]
struct RouteSuggestion {
    job_id: Uuid,
    service: String,
    candidates: Vec<VendorSuggestion>,
}

#[derive(Serialize)]
struct MissionControlResponse {
    generated_at: DateTime<Utc>,
    queue: Vec<QueueEntry>,
    escalations: Vec<QueueEntry>,
    route_suggestions: Vec<RouteSuggestion>,
    scorecards: Vec<VendorScorecard>,
}

async fn mission_control(State(state): State<Arc<AppState>>) -> Json<MissionControlResponse> {
    let now = Utc::now();

    let queue = scoring::open_job_queue(&state, now);
    let escalations = scoring::escalation_queue(&state, now);
    state
        .metrics
        .escalation_queue_depth
        .set(escalations.len() as i64);

    let route_suggestions = state
        .jobs
        .iter()
        .filter(|entry| {
            let job = entry.value();
            job.status == JobStatus::Unassigned && job.pickup.is_some()
        })
        .map(|entry| {
            let job = entry.value();
            RouteSuggestion {
                job_id: job.id,
                service: job.service.clone(),
                candidates: scoring::rank_vendors(&state, job),
            }
        })
        .collect();

    let scorecards = state
        .vendors
        .iter()
        .map(|entry| {
            scoring::vendor_scorecard(
                &state,
                entry.value(),
                state.config.scorecard_window_days,
                now,
            )
        })
        .collect();

    Json(MissionControlResponse {
        generated_at: now,
        queue,
        escalations,
        route_suggestions,
        scorecards,
    })
}

async fn list_outbox(State(state): State<Arc<AppState>>) -> Json<Vec<OutboxEntry>> {
    let mut entries: Vec<OutboxEntry> = state
        .outbox
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    entries.sort_by_key(|entry| entry.created_at);
    Json(entries)
}

async fn list_charges(State(state): State<Arc<AppState>>) -> Json<Vec<CommissionCharge>> {
    let mut charges: Vec<CommissionCharge> = state
        .charges
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    charges.sort_by_key(|charge| charge.requested_at);
    Json(charges)
}
