use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bids_submitted_total: IntCounterVec,
    pub jobs_completed_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub notification_send_seconds: HistogramVec,
    pub escalation_queue_depth: IntGauge,
    pub breaker_open: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bids_submitted_total = IntCounterVec::new(
            Opts::new("bids_submitted_total", "Total bids submitted by bid mode"),
            &["mode"],
        )
        .expect("valid bids_submitted_total metric");

        let jobs_completed_total = IntCounterVec::new(
            Opts::new(
                "jobs_completed_total",
                "Total settled jobs by commission outcome",
            ),
            &["commission"],
        )
        .expect("valid jobs_completed_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new(
                "notifications_total",
                "Total notification sends by channel and outcome",
            ),
            &["channel", "outcome"],
        )
        .expect("valid notifications_total metric");

        let notification_send_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "notification_send_seconds",
                "Latency of notification delivery in seconds",
            ),
            &["outcome"],
        )
        .expect("valid notification_send_seconds metric");

        let escalation_queue_depth = IntGauge::new(
            "escalation_queue_depth",
            "Jobs currently at SLA risk or escalated",
        )
        .expect("valid escalation_queue_depth metric");

        let breaker_open = IntGauge::new(
            "notification_breaker_open",
            "1 while the notification circuit breaker is open",
        )
        .expect("valid notification_breaker_open metric");

        registry
            .register(Box::new(bids_submitted_total.clone()))
            .expect("register bids_submitted_total");
        registry
            .register(Box::new(jobs_completed_total.clone()))
            .expect("register jobs_completed_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(notification_send_seconds.clone()))
            .expect("register notification_send_seconds");
        registry
            .register(Box::new(escalation_queue_depth.clone()))
            .expect("register escalation_queue_depth");
        registry
            .register(Box::new(breaker_open.clone()))
            .expect("register notification_breaker_open");

        Self {
            registry,
            bids_submitted_total,
            jobs_completed_total,
            notifications_total,
            notification_send_seconds,
            escalation_queue_depth,
            breaker_open,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
