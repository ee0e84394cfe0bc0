use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dashmap::mapref::entry::Entry;

use crate::engine::commission::round_currency;
use crate::engine::lifecycle;
use crate::engine::scoring;
use crate::error::AppError;
use crate::models::bid::{AccessToken, Bid, BidKey, BidView, TokenKind};
use crate::models::event::DispatchEvent;
use crate::models::job::{BidMode, Job, JobStatus};
use crate::models::vendor::GeoPoint;
use crate::state::AppState;

const MIN_ETA_MINUTES: i64 = 1;
const MAX_ETA_MINUTES: i64 = 720;

fn mint_token(state: &AppState, job_id: Uuid, kind: TokenKind) -> String {
    let token = format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    );
    state.tokens.insert(
        token.clone(),
        AccessToken {
            token: token.clone(),
            job_id,
            kind,
            issued_at: Utc::now(),
        },
    );
    token
}

fn resolve_token(state: &AppState, token: &str, kind: TokenKind) -> Result<Uuid, AppError> {
    state
        .tokens
        .get(token)
        .filter(|grant| grant.kind == kind)
        .map(|grant| grant.job_id)
        .ok_or_else(|| AppError::NotFound("unknown token".to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct PortalLinks {
    pub vendor_bid_url: String,
    pub customer_bids_url: String,
}

pub struct OpenBiddingOutcome {
    pub job: Job,
    pub links: PortalLinks,
    pub ping_targets: Vec<(String, String)>,
}

/// Opens competitive bidding on a job: mints the job-scoped tokens if absent
/// and returns the vendors worth pinging (ranked suggestions).
pub fn open_bidding(state: &AppState, job_id: Uuid) -> Result<OpenBiddingOutcome, AppError> {
    let job = {
        let mut job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;

        if job.status == JobStatus::Completed {
            return Err(AppError::Conflict(
                "bidding cannot be opened on a completed job".to_string(),
            ));
        }
        if job.bid_mode == BidMode::Fixed && job.quoted_price.is_none() {
            return Err(AppError::Conflict(
                "fixed-mode bidding requires a quoted price".to_string(),
            ));
        }

        job.bidding_open = true;
        if job.tokens.bidding.is_none() {
            job.tokens.bidding = Some(mint_token(state, job_id, TokenKind::Bidding));
        }
        if job.tokens.customer.is_none() {
            job.tokens.customer = Some(mint_token(state, job_id, TokenKind::Customer));
        }
        job.updated_at = Utc::now();
        job.clone()
    };

    let links = PortalLinks {
        vendor_bid_url: format!("/bids/job/{}", job.tokens.bidding.as_deref().unwrap_or("")),
        customer_bids_url: format!(
            "/bids/list/{}",
            job.tokens.customer.as_deref().unwrap_or("")
        ),
    };

    let ping_targets = scoring::rank_vendors(state, &job)
        .into_iter()
        .map(|suggestion| (suggestion.name, suggestion.phone))
        .collect();

    Ok(OpenBiddingOutcome {
        job,
        links,
        ping_targets,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct JobPreview {
    pub service: String,
    pub urgency: crate::models::job::Urgency,
    pub bid_mode: BidMode,
    pub quoted_price: Option<f64>,
    pub pickup: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
}

/// Vendor-facing job preview behind the bidding token; 404 once bidding is
/// closed so the link goes dead.
pub fn job_preview(state: &AppState, token: &str) -> Result<JobPreview, AppError> {
    let job_id = resolve_token(state, token, TokenKind::Bidding)?;
    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;

    if !job.bidding_open {
        return Err(AppError::NotFound("bidding is closed".to_string()));
    }

    Ok(JobPreview {
        service: job.service.clone(),
        urgency: job.urgency,
        bid_mode: job.bid_mode,
        quoted_price: job.quoted_price,
        pickup: job.pickup,
        created_at: job.created_at,
    })
}

#[derive(Debug, Deserialize)]
pub struct BidSubmission {
    pub vendor_id: Option<Uuid>,
    pub vendor_name: String,
    pub vendor_phone: String,
    pub eta_minutes: i64,
    pub price: Option<f64>,
}

pub fn submit_bid(state: &AppState, token: &str, submission: BidSubmission) -> Result<Bid, AppError> {
    let job_id = resolve_token(state, token, TokenKind::Bidding)?;
    let (bid_mode, quoted_price, bidding_open) = {
        let job = state
            .jobs
            .get(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;
        (job.bid_mode, job.quoted_price, job.bidding_open)
    };

    if !bidding_open {
        return Err(AppError::Conflict("bidding is closed".to_string()));
    }
    if submission.vendor_phone.trim().is_empty() {
        return Err(AppError::BadRequest("vendor phone is required".to_string()));
    }
    if submission.eta_minutes <= 0 {
        return Err(AppError::BadRequest(
            "eta_minutes must be greater than zero".to_string(),
        ));
    }
    let eta_minutes = submission.eta_minutes.clamp(MIN_ETA_MINUTES, MAX_ETA_MINUTES);

    let price = match bid_mode {
        BidMode::Fixed => quoted_price.unwrap_or(0.0),
        BidMode::Open => {
            let offered = submission
                .price
                .ok_or_else(|| AppError::BadRequest("price is required for open bidding".to_string()))?;
            if !offered.is_finite() || offered < 0.0 {
                return Err(AppError::BadRequest("price must be non-negative".to_string()));
            }
            offered
        }
    };
    let price = round_currency(price);

    let now = Utc::now();
    let key = BidKey::new(job_id, submission.vendor_id, &submission.vendor_phone);
    let bid = match state.bids.entry(key) {
        Entry::Occupied(mut slot) => {
            let bid = slot.get_mut();
            bid.eta_minutes = eta_minutes;
            bid.price = price;
            bid.vendor_name = submission.vendor_name;
            bid.updated_at = now;
            bid.clone()
        }
        Entry::Vacant(slot) => slot
            .insert(Bid {
                id: Uuid::new_v4(),
                job_id,
                vendor_id: submission.vendor_id,
                vendor_name: submission.vendor_name,
                vendor_phone: submission.vendor_phone.trim().to_string(),
                eta_minutes,
                price,
                created_at: now,
                updated_at: now,
            })
            .clone(),
    };

    state
        .metrics
        .bids_submitted_total
        .with_label_values(&[match bid_mode {
            BidMode::Open => "open",
            BidMode::Fixed => "fixed",
        }])
        .inc();
    state.publish(DispatchEvent::BidSubmitted {
        job_id,
        vendor_name: bid.vendor_name.clone(),
        eta_minutes: bid.eta_minutes,
        price: bid.price,
    });

    Ok(bid)
}

pub fn list_bids(state: &AppState, token: &str) -> Result<Vec<BidView>, AppError> {
    let job_id = resolve_token(state, token, TokenKind::Customer)?;

    let mut views: Vec<BidView> = state
        .bids
        .iter()
        .filter(|entry| entry.value().job_id == job_id)
        .map(|entry| BidView::from(entry.value()))
        .collect();

    views.sort_by_key(|view| view.eta_minutes);
    Ok(views)
}

#[derive(Debug)]
pub struct SelectionOutcome {
    pub job: Job,
    pub bid: Bid,
    pub vendor_accept_url: String,
    pub already_selected: bool,
}

/// Locks the job to exactly one bid. The compare-and-set on
/// `selected_bid_id` runs under the job's entry lock, so of two racing
/// selections one wins and the other sees the conflict.
pub fn select_bid(state: &AppState, bid_id: Uuid) -> Result<SelectionOutcome, AppError> {
    let bid = state
        .bids
        .iter()
        .find(|entry| entry.value().id == bid_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("bid {bid_id} not found")))?;

    let now = Utc::now();
    let (job, already_selected) = {
        let mut job = state
            .jobs
            .get_mut(&bid.job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {} not found", bid.job_id)))?;

        match job.selected_bid_id {
            Some(existing) if existing != bid_id => {
                return Err(AppError::Conflict(
                    "another bid was already accepted for this job".to_string(),
                ));
            }
            Some(_) => (job.clone(), true),
            None => {
                lifecycle::transition(&mut *job, JobStatus::Assigned, now)?;
                job.selected_bid_id = Some(bid_id);
                if let Some(previous) = job.vendor_id {
                    if Some(previous) != bid.vendor_id {
                        job.prior_vendor_ids.push(previous);
                    }
                }
                job.vendor_id = bid.vendor_id;
                job.vendor_name = Some(bid.vendor_name.clone());
                job.vendor_phone = Some(bid.vendor_phone.clone());
                job.bidding_open = false;
                job.final_price = Some(round_currency(match job.bid_mode {
                    BidMode::Fixed => job.quoted_price.unwrap_or(bid.price),
                    BidMode::Open => bid.price,
                }));
                if job.tokens.acceptance.is_none() {
                    job.tokens.acceptance = Some(mint_token(state, job.id, TokenKind::Acceptance));
                }
                (job.clone(), false)
            }
        }
    };

    if !already_selected {
        state.publish(DispatchEvent::VendorAssigned {
            job_id: job.id,
            vendor_name: bid.vendor_name.clone(),
        });
    }

    let vendor_accept_url = format!(
        "/portal/jobs/{}",
        job.tokens.acceptance.as_deref().unwrap_or("")
    );

    Ok(SelectionOutcome {
        job,
        bid,
        vendor_accept_url,
        already_selected,
    })
}
