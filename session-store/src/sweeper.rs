//! Background expiry sweep

use crate::service::SessionService;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Run [`SessionService::sweep_expired`] every `period` until the task is aborted
pub fn spawn_expiry_sweeper(service: Arc<SessionService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(period_secs = period.as_secs(), "Starting expiry sweeper");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let service = service.clone();
            match tokio::task::spawn_blocking(move || service.sweep_expired()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Expiry sweep failed"),
                Err(e) => tracing::error!(error = %e, "Expiry sweep panicked"),
            }
        }
    })
}
