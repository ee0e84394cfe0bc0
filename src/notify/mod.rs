use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use crate::config::SenderConfig;
use crate::models::outbox::{OutboxEntry, OutboxStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Push => "push",
        }
    }
}

#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send(&self, recipient: &str, body: &str) -> Result<(), String>;
}

/// Stand-in gateway until a real SMS/push provider is wired up: logs the
/// message and reports success.
pub struct SimulatedProvider {
    channel: Channel,
}

impl SimulatedProvider {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl NotificationProvider for SimulatedProvider {
    async fn send(&self, recipient: &str, body: &str) -> Result<(), String> {
        tracing::info!(channel = self.channel.as_str(), recipient, body, "notification sent");
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("breaker_open")]
    BreakerOpen,

    #[error("{0}")]
    Exhausted(String),
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

pub struct ResilientSender {
    sms: Arc<dyn NotificationProvider>,
    push: Arc<dyn NotificationProvider>,
    cfg: SenderConfig,
    breaker: Mutex<BreakerState>,
}

impl ResilientSender {
    pub fn new(
        cfg: SenderConfig,
        sms: Arc<dyn NotificationProvider>,
        push: Arc<dyn NotificationProvider>,
    ) -> Self {
        Self {
            sms,
            push,
            cfg,
            breaker: Mutex::new(BreakerState::default()),
        }
    }

    pub fn breaker_is_open(&self) -> bool {
        let state = self.breaker.lock().expect("breaker lock");
        matches!(state.open_until, Some(until) if Instant::now() < until)
    }

    /// One call = up to `max_attempts` provider attempts, each raced against
    /// the per-attempt timeout, with linear backoff in between. The breaker
    /// counts exhausted calls; while open, the provider is never touched.
    pub async fn send(&self, channel: Channel, recipient: &str, body: &str) -> Result<(), SendError> {
        if self.breaker_is_open() {
            return Err(SendError::BreakerOpen);
        }

        let provider = match channel {
            Channel::Sms => &self.sms,
            Channel::Push => &self.push,
        };
        let attempt_timeout = Duration::from_millis(self.cfg.attempt_timeout_ms);
        let backoff = Duration::from_millis(self.cfg.backoff_ms);
        let max_attempts = self.cfg.max_attempts.max(1);

        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            match timeout(attempt_timeout, provider.send(recipient, body)).await {
                Ok(Ok(())) => {
                    self.record_success();
                    return Ok(());
                }
                Ok(Err(err)) => last_error = err,
                Err(_) => {
                    last_error = format!("send timed out after {}ms", self.cfg.attempt_timeout_ms)
                }
            }

            if attempt < max_attempts {
                sleep(backoff * attempt).await;
            }
        }

        self.record_failure();
        Err(SendError::Exhausted(last_error))
    }

    fn record_success(&self) {
        let mut state = self.breaker.lock().expect("breaker lock");
        state.consecutive_failures = 0;
        state.open_until = None;
    }

    fn record_failure(&self) {
        let mut state = self.breaker.lock().expect("breaker lock");
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.cfg.breaker_threshold {
            state.open_until =
                Some(Instant::now() + Duration::from_millis(self.cfg.breaker_cooldown_ms));
        }
    }
}

/// The only notification surface the rest of the engine calls. Failures are
/// absorbed here: the message lands in the outbox and the primary operation
/// carries on.
pub async fn dispatch_notification(
    state: &AppState,
    channel: Channel,
    recipient: &str,
    body: &str,
    job_id: Option<Uuid>,
) {
    let started = Instant::now();
    match state.notifier.send(channel, recipient, body).await {
        Ok(()) => {
            state
                .metrics
                .notifications_total
                .with_label_values(&[channel.as_str(), "sent"])
                .inc();
            state
                .metrics
                .notification_send_seconds
                .with_label_values(&["sent"])
                .observe(started.elapsed().as_secs_f64());
        }
        Err(err) => {
            state
                .metrics
                .notifications_total
                .with_label_values(&[channel.as_str(), "queued"])
                .inc();
            state
                .metrics
                .notification_send_seconds
                .with_label_values(&["queued"])
                .observe(started.elapsed().as_secs_f64());
            tracing::warn!(
                channel = channel.as_str(),
                recipient,
                error = %err,
                "notification fell back to outbox"
            );

            let entry = OutboxEntry {
                id: Uuid::new_v4(),
                kind: channel,
                recipient: recipient.to_string(),
                body: body.to_string(),
                job_id,
                status: OutboxStatus::Queued,
                error: Some(err.to_string()),
                created_at: Utc::now(),
            };
            state.outbox.insert(entry.id, entry);
        }
    }

    state
        .metrics
        .breaker_open
        .set(state.notifier.breaker_is_open() as i64);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{Channel, NotificationProvider, ResilientSender, SendError};
    use crate::config::SenderConfig;

    struct FailingProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl NotificationProvider for FailingProvider {
        async fn send(&self, _recipient: &str, _body: &str) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("gateway unreachable".to_string())
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl NotificationProvider for SlowProvider {
        async fn send(&self, _recipient: &str, _body: &str) -> Result<(), String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    struct FlakyProvider {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl NotificationProvider for FlakyProvider {
        async fn send(&self, _recipient: &str, _body: &str) -> Result<(), String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err("flaky".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn cfg(max_attempts: u32, cooldown_ms: u64) -> SenderConfig {
        SenderConfig {
            attempt_timeout_ms: 50,
            max_attempts,
            backoff_ms: 1,
            breaker_threshold: 5,
            breaker_cooldown_ms: cooldown_ms,
        }
    }

    fn sender_with(provider: Arc<dyn NotificationProvider>, cfg: SenderConfig) -> ResilientSender {
        ResilientSender::new(cfg, provider.clone(), provider)
    }

    #[tokio::test]
    async fn retries_then_succeeds_within_one_call() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let sender = sender_with(provider.clone(), cfg(3, 60_000));

        sender.send(Channel::Sms, "+1555", "hi").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(!sender.breaker_is_open());
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_skips_provider() {
        let provider = Arc::new(FailingProvider {
            calls: AtomicU32::new(0),
        });
        let sender = sender_with(provider.clone(), cfg(1, 60_000));

        for _ in 0..5 {
            let err = sender.send(Channel::Sms, "+1555", "hi").await.unwrap_err();
            assert!(matches!(err, SendError::Exhausted(_)));
        }
        assert!(sender.breaker_is_open());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);

        let err = sender.send(Channel::Sms, "+1555", "hi").await.unwrap_err();
        assert_eq!(err.to_string(), "breaker_open");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn breaker_half_opens_after_cooldown() {
        let provider = Arc::new(FailingProvider {
            calls: AtomicU32::new(0),
        });
        let sender = sender_with(provider.clone(), cfg(1, 100));

        for _ in 0..5 {
            let _ = sender.send(Channel::Push, "ops", "ping").await;
        }
        assert!(sender.breaker_is_open());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!sender.breaker_is_open());

        let _ = sender.send(Channel::Push, "ops", "ping").await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
        assert!(sender.breaker_is_open());
    }

    #[tokio::test]
    async fn success_resets_the_failure_count() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            fail_first: 4,
        });
        let sender = sender_with(provider.clone(), cfg(1, 60_000));

        for _ in 0..4 {
            let _ = sender.send(Channel::Sms, "+1555", "hi").await;
        }
        sender.send(Channel::Sms, "+1555", "hi").await.unwrap();
        assert!(!sender.breaker_is_open());

        let _ = sender.send(Channel::Sms, "+1555", "hi").await;
        assert!(!sender.breaker_is_open());
    }

    #[tokio::test]
    async fn attempts_are_bounded_by_the_timeout() {
        let sender = sender_with(Arc::new(SlowProvider), cfg(1, 60_000));

        let started = std::time::Instant::now();
        let err = sender.send(Channel::Sms, "+1555", "hi").await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
    }
}
