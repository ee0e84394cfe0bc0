use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::commission::{self, round_currency};
use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::charge::{ChargeStatus, CommissionCharge};
use crate::models::event::DispatchEvent;
use crate::models::job::{CommissionBlock, CommissionStatus, Job, JobStatus, ReportedPayment};
use crate::state::AppState;

const NO_PAYMENT_METHOD: &str = "No payment method on file";
const PROCESSOR: &str = "simulated";

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub amount: f64,
    pub method: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub auto_charge: Option<bool>,
}

/// Completes a job and settles its commission. The completion record is
/// persisted before any charge attempt, and the whole sequence is safe to
/// re-run: the charge row is an upsert on job id and a succeeded charge is
/// never replaced.
pub async fn complete_job(
    state: &AppState,
    job_id: Uuid,
    request: CompletionRequest,
) -> Result<Job, AppError> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(AppError::BadRequest(
            "amount must be greater than zero".to_string(),
        ));
    }

    let now = Utc::now();
    let (auto_charge, customer_phone) = {
        let mut job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;

        let eval = commission::evaluate(&job, request.amount, &state.config.commission);
        lifecycle::transition(&mut *job, JobStatus::Completed, now)?;

        job.reported_payment = Some(ReportedPayment {
            amount: round_currency(request.amount),
            method: request.method,
            note: request.note,
            actor: request.actor,
            reported_at: now,
        });
        job.expected_revenue = Some(eval.expected_revenue);
        job.flags.under_report = eval.flagged;
        job.flags.under_report_reason = eval.flag_reason.clone();

        let effective = request.auto_charge.unwrap_or(eval.should_auto_charge)
            && job.vendor_id.is_some();
        job.commission = Some(CommissionBlock {
            rate: eval.rate,
            amount: eval.commission_amount,
            status: if effective {
                CommissionStatus::Pending
            } else {
                CommissionStatus::Skipped
            },
            charged_at: None,
            charge_id: None,
            failure_reason: None,
        });

        (effective, job.customer.phone.clone())
    };

    if auto_charge {
        charge_commission(state, job_id)?;
    }

    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?
        .clone();

    let commission_status = job
        .commission
        .as_ref()
        .map(|c| format!("{:?}", c.status).to_lowercase())
        .unwrap_or_else(|| "none".to_string());
    state
        .metrics
        .jobs_completed_total
        .with_label_values(&[commission_status.as_str()])
        .inc();
    state.publish(DispatchEvent::JobCompleted {
        job_id,
        amount: job
            .reported_payment
            .as_ref()
            .map(|p| p.amount)
            .unwrap_or_default(),
        commission_status,
    });

    crate::notify::dispatch_notification(
        state,
        crate::notify::Channel::Sms,
        &customer_phone,
        &format!("Your {} service is complete. Thanks for using roadcall.", job.service),
        Some(job_id),
    )
    .await;

    Ok(job)
}

/// Charge step only: vendor billing lookup, simulated processor call, charge
/// row upsert and job commission mirror. Missing payment details are a
/// recorded outcome, not an error.
pub fn charge_commission(state: &AppState, job_id: Uuid) -> Result<CommissionCharge, AppError> {
    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?
        .clone();

    if job.status != JobStatus::Completed {
        return Err(AppError::Conflict(
            "commission can only be charged on a completed job".to_string(),
        ));
    }
    let commission = job.commission.clone().ok_or_else(|| {
        AppError::Dependency("commission record missing for completed job".to_string())
    })?;
    let vendor_id = job.vendor_id.ok_or_else(|| {
        AppError::Conflict("no vendor assigned to charge".to_string())
    })?;
    let reported_amount = job
        .reported_payment
        .as_ref()
        .map(|p| p.amount)
        .unwrap_or_default();

    let payment_method = state
        .vendors
        .get(&vendor_id)
        .and_then(|vendor| vendor.billing.default_payment_method.clone());

    let now = Utc::now();
    let (status, processor_ref, failure_reason) = match payment_method {
        Some(_) => (
            ChargeStatus::Succeeded,
            Some(format!("sim_{}", Uuid::new_v4().simple())),
            None,
        ),
        None => (ChargeStatus::Failed, None, Some(NO_PAYMENT_METHOD.to_string())),
    };

    let charge = match state.charges.entry(job_id) {
        Entry::Occupied(mut slot) => {
            let row = slot.get_mut();
            // A succeeded charge is final; replays converge on it.
            if row.status != ChargeStatus::Succeeded {
                row.reported_amount = reported_amount;
                row.commission_rate = commission.rate;
                row.commission_amount = commission.amount;
                row.status = status;
                row.processor_ref = processor_ref;
                row.failure_reason = failure_reason;
                row.processed_at = Some(now);
            }
            row.clone()
        }
        Entry::Vacant(slot) => slot
            .insert(CommissionCharge {
                id: Uuid::new_v4(),
                job_id,
                vendor_id,
                reported_amount,
                commission_rate: commission.rate,
                commission_amount: commission.amount,
                status,
                processor: PROCESSOR.to_string(),
                processor_ref,
                failure_reason,
                requested_at: now,
                processed_at: Some(now),
            })
            .clone(),
    };

    if let Some(mut job) = state.jobs.get_mut(&job_id) {
        job.commission = Some(CommissionBlock {
            rate: charge.commission_rate,
            amount: charge.commission_amount,
            status: match charge.status {
                ChargeStatus::Succeeded => CommissionStatus::Charged,
                ChargeStatus::Failed => CommissionStatus::Failed,
                ChargeStatus::Pending => CommissionStatus::Pending,
            },
            charged_at: (charge.status == ChargeStatus::Succeeded)
                .then(|| charge.processed_at.unwrap_or(now)),
            charge_id: Some(charge.id),
            failure_reason: charge.failure_reason.clone(),
        });
        job.updated_at = now;
    }

    match charge.status {
        ChargeStatus::Succeeded => tracing::info!(
            job_id = %job_id,
            amount = charge.commission_amount,
            processor_ref = charge.processor_ref.as_deref().unwrap_or(""),
            "commission charged"
        ),
        _ => tracing::warn!(
            job_id = %job_id,
            reason = charge.failure_reason.as_deref().unwrap_or(""),
            "commission charge did not succeed"
        ),
    }

    Ok(charge)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{charge_commission, complete_job, CompletionRequest};
    use crate::config::Config;
    use crate::models::charge::ChargeStatus;
    use crate::models::job::{
        BidMode, CommissionStatus, CustomerRef, Job, JobStatus, Urgency,
    };
    use crate::models::vendor::{BillingProfile, Vendor};
    use crate::state::AppState;

    fn request(amount: f64) -> CompletionRequest {
        CompletionRequest {
            amount,
            method: "card".to_string(),
            note: None,
            actor: Some("dispatcher".to_string()),
            auto_charge: None,
        }
    }

    fn seed_vendor(state: &AppState, payment_method: Option<&str>) -> Uuid {
        let now = Utc::now();
        let vendor = Vendor {
            id: Uuid::new_v4(),
            name: "Ace Towing".to_string(),
            phone: "+15556667777".to_string(),
            location: None,
            active: true,
            updates_paused: false,
            services: vec!["tow".to_string()],
            heavy_duty: false,
            billing: BillingProfile {
                processor_customer_id: Some("cus_123".to_string()),
                default_payment_method: payment_method.map(str::to_string),
            },
            compliance_ok: true,
            created_at: now,
            updated_at: now,
        };
        let id = vendor.id;
        state.vendors.insert(id, vendor);
        id
    }

    fn seed_assigned_job(state: &AppState, vendor_id: Uuid) -> Uuid {
        let mut job = Job::new(
            CustomerRef {
                name: "Lee".to_string(),
                phone: "+15550005555".to_string(),
            },
            "tow".to_string(),
            Urgency::Standard,
            BidMode::Open,
            Some(120.0),
            None,
            None,
        );
        job.status = JobStatus::Assigned;
        job.assigned_at = Some(Utc::now());
        job.vendor_id = Some(vendor_id);
        job.vendor_name = Some("Ace Towing".to_string());
        let id = job.id;
        state.jobs.insert(id, job);
        id
    }

    #[tokio::test]
    async fn completion_records_payment_and_charges() {
        let state = AppState::new(Config::default());
        let vendor_id = seed_vendor(&state, Some("pm_card_visa"));
        let job_id = seed_assigned_job(&state, vendor_id);

        let job = complete_job(&state, job_id, request(100.0)).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.reported_payment.as_ref().unwrap().amount, 100.0);
        let commission = job.commission.unwrap();
        assert_eq!(commission.status, CommissionStatus::Charged);
        assert_eq!(commission.amount, 30.0);
        assert!(commission.charged_at.is_some());

        let charge = state.charges.get(&job_id).unwrap().clone();
        assert_eq!(charge.status, ChargeStatus::Succeeded);
        assert!(charge.processor_ref.unwrap().starts_with("sim_"));
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected() {
        let state = AppState::new(Config::default());
        let vendor_id = seed_vendor(&state, Some("pm_card_visa"));
        let job_id = seed_assigned_job(&state, vendor_id);

        let err = complete_job(&state, job_id, request(0.0)).await.unwrap_err();
        assert!(err.to_string().contains("greater than zero"));

        let job = state.jobs.get(&job_id).unwrap().clone();
        assert_eq!(job.status, JobStatus::Assigned);
    }

    #[tokio::test]
    async fn missing_payment_method_is_a_recorded_failure_not_an_error() {
        let state = AppState::new(Config::default());
        let vendor_id = seed_vendor(&state, None);
        let job_id = seed_assigned_job(&state, vendor_id);

        let job = complete_job(&state, job_id, request(100.0)).await.unwrap();

        let commission = job.commission.unwrap();
        assert_eq!(commission.status, CommissionStatus::Failed);
        assert_eq!(
            commission.failure_reason.as_deref(),
            Some("No payment method on file")
        );
        let charge = state.charges.get(&job_id).unwrap().clone();
        assert_eq!(charge.status, ChargeStatus::Failed);
    }

    #[tokio::test]
    async fn double_completion_is_idempotent() {
        let state = AppState::new(Config::default());
        let vendor_id = seed_vendor(&state, Some("pm_card_visa"));
        let job_id = seed_assigned_job(&state, vendor_id);

        let first = complete_job(&state, job_id, request(100.0)).await.unwrap();
        let second = complete_job(&state, job_id, request(100.0)).await.unwrap();

        assert_eq!(state.charges.len(), 1);
        let first_commission = first.commission.unwrap();
        let second_commission = second.commission.unwrap();
        assert_eq!(first_commission.amount, second_commission.amount);
        assert_eq!(first_commission.charge_id, second_commission.charge_id);
    }

    #[tokio::test]
    async fn no_vendor_means_commission_skipped() {
        let state = AppState::new(Config::default());
        let mut job = Job::new(
            CustomerRef {
                name: "Lee".to_string(),
                phone: "+15550005555".to_string(),
            },
            "tow".to_string(),
            Urgency::Standard,
            BidMode::Open,
            Some(120.0),
            None,
            None,
        );
        job.status = JobStatus::Assigned;
        let job_id = job.id;
        state.jobs.insert(job_id, job);

        let job = complete_job(&state, job_id, request(100.0)).await.unwrap();

        assert_eq!(job.commission.unwrap().status, CommissionStatus::Skipped);
        assert!(state.charges.get(&job_id).is_none());
    }

    #[tokio::test]
    async fn auto_charge_override_skips_the_charge() {
        let state = AppState::new(Config::default());
        let vendor_id = seed_vendor(&state, Some("pm_card_visa"));
        let job_id = seed_assigned_job(&state, vendor_id);

        let mut req = request(100.0);
        req.auto_charge = Some(false);
        let job = complete_job(&state, job_id, req).await.unwrap();

        assert_eq!(job.commission.unwrap().status, CommissionStatus::Skipped);
        assert!(state.charges.get(&job_id).is_none());
    }

    #[tokio::test]
    async fn failed_charge_can_be_retried_after_fixing_billing() {
        let state = AppState::new(Config::default());
        let vendor_id = seed_vendor(&state, None);
        let job_id = seed_assigned_job(&state, vendor_id);

        complete_job(&state, job_id, request(100.0)).await.unwrap();
        assert_eq!(
            state.charges.get(&job_id).unwrap().status,
            ChargeStatus::Failed
        );

        state
            .vendors
            .get_mut(&vendor_id)
            .unwrap()
            .billing
            .default_payment_method = Some("pm_card_visa".to_string());

        let charge = charge_commission(&state, job_id).unwrap();
        assert_eq!(charge.status, ChargeStatus::Succeeded);

        let job = state.jobs.get(&job_id).unwrap().clone();
        assert_eq!(job.commission.unwrap().status, CommissionStatus::Charged);
    }
}
