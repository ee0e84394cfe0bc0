use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::engine::bidding::{self, BidSubmission, JobPreview, PortalLinks};
use crate::error::AppError;
use crate::models::bid::{Bid, BidView};
use crate::models::job::Job;
use crate::notify::{dispatch_notification, Channel};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/:id/open-bidding", post(open_bidding))
        .route("/bids/job/:token", get(preview))
        .route("/bids/:id", post(submit_bid))
        .route("/bids/list/:token", get(list_bids))
        .route("/bids/:id/select", post(select_bid))
}

#[derive(Serialize)]
struct OpenBiddingResponse {
    job_id: Uuid,
    bidding_open: bool,
    links: PortalLinks,
}

async fn open_bidding(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OpenBiddingResponse>, AppError> {
    let outcome = bidding::open_bidding(&state, id)?;
    tracing::info!(job_id = %id, pings = outcome.ping_targets.len(), "bidding opened");

    for (name, phone) in &outcome.ping_targets {
        dispatch_notification(
            &state,
            Channel::Sms,
            phone,
            &format!(
                "{name}: a {} job is open for bids: {}",
                outcome.job.service, outcome.links.vendor_bid_url
            ),
            Some(id),
        )
        .await;
    }

    Ok(Json(OpenBiddingResponse {
        job_id: id,
        bidding_open: true,
        links: outcome.links,
    }))
}

async fn preview(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<JobPreview>, AppError> {
    let preview = bidding::job_preview(&state, &token)?;
    Ok(Json(preview))
}

async fn submit_bid(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(payload): Json<BidSubmission>,
) -> Result<Json<Bid>, AppError> {
    let bid = bidding::submit_bid(&state, &token, payload)?;
    Ok(Json(bid))
}

async fn list_bids(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<Vec<BidView>>, AppError> {
    let views = bidding::list_bids(&state, &token)?;
    Ok(Json(views))
}

async fn select_bid(
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = bidding::select_bid(&state, bid_id)?;

    if !outcome.already_selected {
        dispatch_notification(
            &state,
            Channel::Sms,
            &outcome.bid.vendor_phone,
            &format!(
                "You won the {} job. Accept and track it here: {}",
                outcome.job.service, outcome.vendor_accept_url
            ),
            Some(outcome.job.id),
        )
        .await;
        dispatch_notification(
            &state,
            Channel::Sms,
            &outcome.job.customer.phone,
            &format!(
                "{} is on the job, ETA {} minutes.",
                outcome.bid.vendor_name, outcome.bid.eta_minutes
            ),
            Some(outcome.job.id),
        )
        .await;
    }

    let job: &Job = &outcome.job;
    Ok(Json(json!({
        "job": job,
        "portal": {
            "vendor_accept_url": outcome.vendor_accept_url,
        },
    })))
}
