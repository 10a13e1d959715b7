//! Idle sweeper: finalizes sessions when input silently stops arriving.
//!
//! A fixed-period interval loop, independent of request traffic. Polling is a
//! deliberate trade-off against a per-session timer design: one cheap scan of
//! a small in-memory map every period, worst-case one extra period of
//! finalization latency. Started from `main` like the other background jobs.

use super::Aggregator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::debug;

/// Run the sweep loop forever. Each tick drives stalled `Collecting`
/// sessions through the same finalize action as the live path.
pub async fn run_idle_sweeper(aggregator: Arc<Aggregator>, period: Duration) {
    let mut ticker = interval(period);
    ticker.tick().await; // the first tick fires immediately — skip it
    loop {
        ticker.tick().await;
        let finalized = aggregator.sweep_once().await;
        if finalized > 0 {
            debug!(finalized, "idle sweep finalized stalled sessions");
        }
    }
}
