//! Periodic expiry sweep
//!
//! Runs on its own task and talks to the store directly through the capsule
//! service; request handling is never blocked by it. A failed run is logged
//! and the next tick tries again.

use cdoc2_capsule::KeyCapsuleService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::metrics::CapsuleMetrics;

pub fn spawn(service: KeyCapsuleService, period: Duration, metrics: CapsuleMetrics) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "expiry sweep scheduled");
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_once(&service, &metrics).await;
        }
    })
}

/// One sweep. Returns the number of capsules removed, 0 on failure.
pub async fn run_once(service: &KeyCapsuleService, metrics: &CapsuleMetrics) -> u64 {
    match service.expire().await {
        Ok(removed) => {
            metrics.expired.inc_by(removed);
            removed
        }
        Err(e) => {
            error!("expiry sweep failed: {e} (will retry on next tick)");
            0
        }
    }
}
