use serde::Serialize;

use crate::config::CommissionConfig;
use crate::models::job::Job;

#[derive(Debug, Clone, Serialize)]
pub struct CommissionEvaluation {
    pub expected_revenue: f64,
    pub rate: f64,
    pub commission_amount: f64,
    pub shortfall: f64,
    pub flagged: bool,
    pub flag_reason: Option<String>,
    pub should_auto_charge: bool,
}

/// Single rounding point for every currency output, so display and
/// settlement never drift apart.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn coerce_amount(value: Option<f64>) -> f64 {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.max(0.0))
        .unwrap_or(0.0)
}

/// Expected revenue is the running maximum of final price, quoted price and
/// any previously recorded figure, so repeated evaluations never lower it.
pub fn evaluate(job: &Job, reported_amount: f64, cfg: &CommissionConfig) -> CommissionEvaluation {
    let expected_revenue = round_currency(
        coerce_amount(job.final_price)
            .max(coerce_amount(job.quoted_price))
            .max(coerce_amount(job.expected_revenue)),
    );

    let reported = coerce_amount(Some(reported_amount));
    let rate = cfg.rate.clamp(0.0, 1.0);
    let commission_amount = round_currency(reported * rate);
    let shortfall = round_currency((expected_revenue - reported).max(0.0));

    let over_tolerance = shortfall > cfg.absolute_tolerance
        || shortfall > cfg.percent_tolerance * expected_revenue;
    let flagged = expected_revenue > 0.0 && reported > 0.0 && shortfall > 0.0 && over_tolerance;

    let flag_reason = flagged.then(|| {
        format!(
            "reported {reported:.2} is {shortfall:.2} below expected revenue {expected_revenue:.2}"
        )
    });

    let should_auto_charge = cfg.enabled && cfg.auto_charge && commission_amount > 0.0;

    CommissionEvaluation {
        expected_revenue,
        rate,
        commission_amount,
        shortfall,
        flagged,
        flag_reason,
        should_auto_charge,
    }
}
