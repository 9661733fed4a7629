//! Trigger sources
//!
//! The file watcher, the ticker and the signal listener are producers on a
//! single [`TriggerSender`]. [`dispatch`] is the only consumer: it hands each
//! trigger to the scheduler on the blocking pool and handles the final
//! shutdown evaluation.

mod bus;
mod signals;
mod ticker;
mod watcher;

pub use bus::{trigger_bus, TriggerReceiver, TriggerSender};
pub use signals::{classify_signal, spawn_signal_listener, SignalType};
pub use ticker::run_ticker;
pub use watcher::{is_config_event, ConfigWatcher};

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::scheduler::{EvaluationOutcome, RenewalScheduler, Trigger};

/// Consume triggers until a shutdown trigger arrives or every sender is gone
///
/// Evaluations are started concurrently; the scheduler coalesces whatever
/// overlaps. On [`Trigger::Shutdown`] one final evaluation runs and any
/// in-flight renewal is given `timeout` to finish before this returns.
pub async fn dispatch(
    scheduler: Arc<RenewalScheduler>,
    mut rx: TriggerReceiver,
    timeout: Duration,
) {
    while let Some(trigger) = rx.recv().await {
        if trigger == Trigger::Shutdown {
            info!("Shutdown requested, running final renewal attempt");
            let outcome = run_bounded(scheduler.clone(), trigger, timeout).await;

            if outcome == Some(EvaluationOutcome::Coalesced) {
                let waiter = scheduler.clone();
                let idle = tokio::task::spawn_blocking(move || waiter.wait_idle(timeout))
                    .await
                    .unwrap_or(false);
                if !idle {
                    warn!(
                        timeout_secs = timeout.as_secs(),
                        "In-flight renewal did not finish before shutdown"
                    );
                }
            }
            return;
        }

        let scheduler = scheduler.clone();
        tokio::spawn(run_bounded(scheduler, trigger, timeout));
    }

    info!("All trigger sources closed, stopping dispatcher");
}

/// Run one trigger on the blocking pool, bounded by `timeout`
///
/// A timed-out evaluation keeps running in the background; the scheduler
/// stays `Renewing` until it returns, so later triggers coalesce behind it.
pub async fn run_bounded(
    scheduler: Arc<RenewalScheduler>,
    trigger: Trigger,
    timeout: Duration,
) -> Option<EvaluationOutcome> {
    let handle = tokio::task::spawn_blocking(move || scheduler.trigger(trigger));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(e)) => {
            error!(%trigger, error = %e, "Evaluation task failed");
            None
        }
        Err(_) => {
            warn!(
                %trigger,
                timeout_secs = timeout.as_secs(),
                "Evaluation exceeded timeout, filesystem may be unresponsive"
            );
            None
        }
    }
}
