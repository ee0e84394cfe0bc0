use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::models::bid::{AccessToken, Bid, BidKey};
use crate::models::charge::CommissionCharge;
use crate::models::event::DispatchEvent;
use crate::models::job::Job;
use crate::models::outbox::OutboxEntry;
use crate::models::vendor::Vendor;
use crate::notify::{Channel, NotificationProvider, ResilientSender, SimulatedProvider};
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub config: Config,
    pub jobs: DashMap<Uuid, Job>,
    pub bids: DashMap<BidKey, Bid>,
    pub vendors: DashMap<Uuid, Vendor>,
    pub charges: DashMap<Uuid, CommissionCharge>,
    pub outbox: DashMap<Uuid, OutboxEntry>,
    pub tokens: DashMap<String, AccessToken>,
    pub events_tx: broadcast::Sender<DispatchEvent>,
    pub notifier: ResilientSender,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let sms = Arc::new(SimulatedProvider::new(Channel::Sms));
        let push = Arc::new(SimulatedProvider::new(Channel::Push));
        Self::with_providers(config, sms, push)
    }

    pub fn with_providers(
        config: Config,
        sms: Arc<dyn NotificationProvider>,
        push: Arc<dyn NotificationProvider>,
    ) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size.max(1));
        let notifier = ResilientSender::new(config.sender.clone(), sms, push);

        Self {
            config,
            jobs: DashMap::new(),
            bids: DashMap::new(),
            vendors: DashMap::new(),
            charges: DashMap::new(),
            outbox: DashMap::new(),
            tokens: DashMap::new(),
            events_tx,
            notifier,
            metrics: Metrics::new(),
        }
    }

    pub fn publish(&self, event: DispatchEvent) {
        let _ = self.events_tx.send(event);
    }
}
