//! Time-based triggers
//!
//! With a positive interval the ticker forces a check every interval,
//! independently of other triggers. With a zero interval there is no
//! wall-clock polling: the ticker sleeps until the deployed material
//! expires (declared `TLSValidUntil` or certificate not-after, whichever is
//! first), fires a single [`Trigger::Expiry`], and then waits for the next
//! write to publish a new instant.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::TriggerSender;
use crate::scheduler::Trigger;

/// Slack added after a not-after instant so the certificate is strictly expired
const EXPIRY_GRACE: Duration = Duration::from_secs(1);

/// Longest single sleep; the wall clock is re-read after each one
const MAX_SLEEP: Duration = Duration::from_secs(24 * 3600);

/// Run the ticker until the trigger bus closes
pub async fn run_ticker(
    interval: Duration,
    bus: TriggerSender,
    expiry: watch::Receiver<Option<DateTime<Utc>>>,
) {
    if interval.is_zero() {
        info!("Periodic checks disabled, waking only on certificate expiry");
        run_expiry_timer(bus, expiry).await;
    } else {
        info!(check_interval_secs = interval.as_secs(), "Starting periodic checks");
        run_interval(interval, bus).await;
    }
}

async fn run_interval(period: Duration, bus: TriggerSender) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        debug!("Running scheduled certificate check");
        if !bus.send(Trigger::TimerTick) {
            break;
        }
    }
}

async fn run_expiry_timer(bus: TriggerSender, mut expiry: watch::Receiver<Option<DateTime<Utc>>>) {
    loop {
        let deadline = *expiry.borrow_and_update();

        match deadline.and_then(until) {
            Some(wait) => {
                debug!(wait_secs = wait.as_secs(), "Sleeping until certificate expiry");
                let expired = tokio::select! {
                    _ = tokio::time::sleep(wait.min(MAX_SLEEP) + EXPIRY_GRACE) => wait <= MAX_SLEEP,
                    changed = expiry.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        false
                    }
                };

                if expired {
                    info!("Deployed certificate reached its expiry");
                    if !bus.send(Trigger::Expiry) {
                        break;
                    }
                    // One expiry trigger per deployed certificate
                    if expiry.changed().await.is_err() {
                        break;
                    }
                }
            }
            // Unknown or already past: wait for the next write
            None => {
                if expiry.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Time left until `deadline`, or `None` if it has passed
fn until(deadline: DateTime<Utc>) -> Option<Duration> {
    (deadline - Utc::now()).to_std().ok().filter(|d| !d.is_zero())
}
