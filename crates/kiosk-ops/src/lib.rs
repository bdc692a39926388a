//! Operational helpers: logging setup and the in-memory activity log.

use std::{collections::VecDeque, sync::Arc};

use kiosk_types::{
    config::OpsConfig,
    events::{EventKind, KioskEvent},
    KioskError, Result,
};
use tokio::sync::Mutex;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

const MAX_ACTIVITY_EVENTS: usize = 1024;

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| KioskError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| KioskError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Bounded record of what the kiosk did, oldest entries dropped first.
#[derive(Clone, Default)]
pub struct ActivityLog {
    events: Arc<Mutex<VecDeque<KioskEvent>>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, event: KioskEvent) {
        debug!("activity {:?} {}", event.kind, event.id);
        let mut events = self.events.lock().await;
        if events.len() == MAX_ACTIVITY_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub async fn snapshot_events(&self) -> Vec<KioskEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    pub async fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }
}
