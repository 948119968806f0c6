//! Periodic background refresh of the remote rule catalog.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::sync::service::RemoteSync;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub refresh_interval: Duration,
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(24 * 60 * 60),
            enabled: false,
        }
    }
}

/// Calls [`RemoteSync::refresh`] on a fixed interval until cancelled.
///
/// The first refresh happens one full interval after start. Failures are
/// logged and the loop keeps going.
pub struct RefreshScheduler {
    sync: Arc<RemoteSync>,
    config: SchedulerConfig,
    last_refresh_at: RwLock<Option<String>>,
}

impl RefreshScheduler {
    pub fn new(sync: Arc<RemoteSync>, config: SchedulerConfig) -> Self {
        Self {
            sync,
            config,
            last_refresh_at: RwLock::new(None),
        }
    }

    /// RFC 3339 time of the last successful scheduled refresh.
    pub fn last_refresh(&self) -> Option<String> {
        self.last_refresh_at.read().clone()
    }

    pub async fn start(self: Arc<Self>, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("scheduled rule refresh disabled");
            return;
        }

        info!(
            interval_secs = self.config.refresh_interval.as_secs(),
            "scheduled rule refresh started"
        );

        let mut ticker = interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; skip that tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduled rule refresh stopped");
                    return;
                }
                _ = ticker.tick() => self.do_refresh(&cancel).await,
            }
        }
    }

    async fn do_refresh(&self, cancel: &CancellationToken) {
        match self.sync.refresh(cancel).await {
            Ok(report) => {
                *self.last_refresh_at.write() = Some(Utc::now().to_rfc3339());
                info!(version = %report.version, "scheduled refresh completed");
            }
            Err(e) => warn!(kind = e.error_kind(), error = %e, "scheduled refresh failed"),
        }
    }
}
