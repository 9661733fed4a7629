//! Renewal scheduler
//!
//! Every trigger source (file watch, ticker, signals) ends up in
//! [`RenewalScheduler::trigger`]. The scheduler keeps one
//! [`SchedulerState`] behind a mutex and runs at most one evaluation at a
//! time:
//!
//! ```text
//!            trigger                         evaluation done
//!   Idle ───────────────▶ Renewing ──────────────────────────▶ Idle
//!                           │  ▲
//!                  trigger  │  │ recheck requested:
//!          (sets recheck,   ▼  │ evaluate again
//!           returns at once)
//! ```
//!
//! Triggers arriving while an evaluation runs are coalesced into a single
//! follow-up evaluation, so a burst of N notifications costs at most two
//! reads of the configuration document.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::detector::{Baseline, ChangeDetector, ChangeVerdict};
use crate::expiry::ExpiryOracle;
use crate::material::Fingerprint;
use crate::sink::OutputSink;
use crate::source::ConfigLoader;

/// Why an evaluation was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Initial evaluation at process start
    Startup,
    /// Configuration file modified
    FileChanged,
    /// Periodic poll
    TimerTick,
    /// Deployed certificate reached its not-after instant
    Expiry,
    /// Operator requested a renewal
    Manual,
    /// Final evaluation before exit
    Shutdown,
    /// Follow-up for triggers coalesced during a previous evaluation
    Recheck,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Startup => "startup",
            Trigger::FileChanged => "file-changed",
            Trigger::TimerTick => "timer",
            Trigger::Expiry => "expiry",
            Trigger::Manual => "manual",
            Trigger::Shutdown => "shutdown",
            Trigger::Recheck => "recheck",
        };
        f.write_str(name)
    }
}

/// Scheduler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Renewing,
}

/// Why material was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewReason {
    FirstSeen,
    Changed,
    Expired,
}

impl fmt::Display for RenewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenewReason::FirstSeen => write!(f, "first-seen"),
            RenewReason::Changed => write!(f, "changed"),
            RenewReason::Expired => write!(f, "expired"),
        }
    }
}

/// Result of one call to [`RenewalScheduler::trigger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// Material written to every target
    Renewed(RenewReason),
    /// Material matches what was last written and is not expired
    Unchanged,
    /// Configuration could not be read or parsed; nothing written
    Skipped,
    /// At least one target failed; baseline not advanced
    WriteFailed,
    /// Another evaluation was running; a recheck was scheduled
    Coalesced,
}

impl EvaluationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, EvaluationOutcome::Skipped | EvaluationOutcome::WriteFailed)
    }
}

/// Process-wide renewal state, owned by the scheduler
#[derive(Debug, Default)]
struct SchedulerState {
    baseline: Baseline,
    deployed_expiry: Option<DateTime<Utc>>,
    phase: Phase,
    recheck_requested: bool,
}

/// Read-only view of the scheduler state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub last_fingerprint: Option<Fingerprint>,
    pub last_valid_until: Option<DateTime<Utc>>,
    pub deployed_expiry: Option<DateTime<Utc>>,
    pub phase: Phase,
    pub recheck_requested: bool,
}

/// Successful write, applied to the state once the evaluation ends
struct Applied {
    baseline: Baseline,
    expires: Option<DateTime<Utc>>,
}

/// Serializes renewal decisions from every trigger source
pub struct RenewalScheduler {
    loader: Arc<dyn ConfigLoader>,
    sink: Arc<dyn OutputSink>,
    oracle: ExpiryOracle,
    state: Mutex<SchedulerState>,
    idle: Condvar,
    expiry_tx: watch::Sender<Option<DateTime<Utc>>>,
}

impl RenewalScheduler {
    /// Create a scheduler in the `Idle` phase with an empty baseline
    pub fn new(
        loader: Arc<dyn ConfigLoader>,
        sink: Arc<dyn OutputSink>,
        oracle: ExpiryOracle,
    ) -> Self {
        let (expiry_tx, _) = watch::channel(None);
        Self {
            loader,
            sink,
            oracle,
            state: Mutex::new(SchedulerState::default()),
            idle: Condvar::new(),
            expiry_tx,
        }
    }

    /// Handle one trigger
    ///
    /// Safe to call from any thread. If an evaluation is already running
    /// this records a recheck and returns [`EvaluationOutcome::Coalesced`]
    /// immediately; otherwise it evaluates on the calling thread, then
    /// keeps re-evaluating while rechecks were requested in the meantime.
    /// Returns the outcome of the caller's own evaluation.
    pub fn trigger(&self, trigger: Trigger) -> EvaluationOutcome {
        {
            let mut state = self.state.lock();
            if state.phase == Phase::Renewing {
                state.recheck_requested = true;
                debug!(%trigger, "Evaluation in progress, coalescing trigger");
                return EvaluationOutcome::Coalesced;
            }
            state.phase = Phase::Renewing;
        }

        let mut current = trigger;
        let mut first_outcome = None;

        loop {
            let baseline = self.state.lock().baseline.clone();
            let (outcome, applied) = self.evaluate(current, &baseline);
            if first_outcome.is_none() {
                first_outcome = Some(outcome);
            }

            let mut state = self.state.lock();
            if let Some(applied) = applied {
                state.baseline = applied.baseline;
                state.deployed_expiry = applied.expires;
                self.expiry_tx.send_replace(applied.expires);
            }

            if state.recheck_requested {
                state.recheck_requested = false;
                current = Trigger::Recheck;
                continue;
            }

            state.phase = Phase::Idle;
            self.idle.notify_all();
            break;
        }

        first_outcome.unwrap_or(EvaluationOutcome::Unchanged)
    }

    /// Decide renew-or-skip for the current configuration and write if needed
    ///
    /// Runs without holding the state lock; exclusivity comes from the
    /// `Renewing` phase.
    fn evaluate(
        &self,
        trigger: Trigger,
        baseline: &Baseline,
    ) -> (EvaluationOutcome, Option<Applied>) {
        let material = match self.loader.load() {
            Ok(material) => material,
            Err(e) => {
                warn!(
                    %trigger,
                    source = %self.loader.describe(),
                    error = %e,
                    kind = e.kind(),
                    "Configuration unusable, keeping previous material"
                );
                return (EvaluationOutcome::Skipped, None);
            }
        };

        let verdict = ChangeDetector::detect(&material, baseline);
        let now = Utc::now();

        let expiry = match self.oracle.evaluate(material.cert_pem(), now) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(%trigger, error = %e, "Cannot determine certificate expiry, skipping expiry check");
                None
            }
        };

        let declared_expired = material.declared_valid_until().is_some_and(|t| t < now);
        let cert_expired = expiry.is_some_and(|r| r.expired);

        let reason = match verdict {
            ChangeVerdict::FirstSeen => RenewReason::FirstSeen,
            ChangeVerdict::ValidUntilChanged { .. } | ChangeVerdict::ContentChanged => {
                RenewReason::Changed
            }
            ChangeVerdict::Unchanged if declared_expired || cert_expired => RenewReason::Expired,
            ChangeVerdict::Unchanged => {
                debug!(%trigger, reason = "unchanged", "Skipping renewal");
                return (EvaluationOutcome::Unchanged, None);
            }
        };

        match (reason, expiry) {
            (RenewReason::Expired, Some(report)) => info!(
                %trigger,
                expired_on = %self.oracle.display(report.not_after),
                "Certificate expired, renewing"
            ),
            _ => info!(%trigger, %reason, %verdict, "Renewing certificate material"),
        }

        let report = self.sink.write(&material);
        if !report.is_complete() {
            error!(
                %trigger,
                failed_targets = report.failures.len(),
                written_targets = report.written.len(),
                reason = "write failure",
                "Renewal incomplete, will retry on next trigger"
            );
            return (EvaluationOutcome::WriteFailed, None);
        }

        // Whichever of the declared and the certificate expiry comes first
        let expires = match (material.declared_valid_until(), expiry.map(|r| r.not_after)) {
            (Some(declared), Some(not_after)) => Some(declared.min(not_after)),
            (declared, not_after) => declared.or(not_after),
        };
        match expires {
            Some(instant) => info!(
                fingerprint = %material.fingerprint(),
                expires = %self.oracle.display(instant),
                "Certificate material updated"
            ),
            None => info!(
                fingerprint = %material.fingerprint(),
                "Certificate material updated, expiry unknown"
            ),
        }

        let applied = Applied {
            baseline: Baseline::from_material(&material),
            expires,
        };
        (EvaluationOutcome::Renewed(reason), Some(applied))
    }

    /// Block until the scheduler is `Idle` or `timeout` elapses
    ///
    /// Returns `true` if the scheduler is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.phase == Phase::Renewing {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.phase == Phase::Idle;
            }
        }
        true
    }

    /// Expiry of the last written material, updated on every write
    ///
    /// The earlier of the declared `TLSValidUntil` and the certificate's
    /// not-after; `None` when neither is known.
    pub fn subscribe_expiry(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.expiry_tx.subscribe()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.state.lock();
        SchedulerSnapshot {
            last_fingerprint: state.baseline.fingerprint,
            last_valid_until: state.baseline.valid_until,
            deployed_expiry: state.deployed_expiry,
            phase: state.phase,
            recheck_requested: state.recheck_requested,
        }
    }
}

impl fmt::Debug for RenewalScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenewalScheduler")
            .field("source", &self.loader.describe())
            .field("timezone", &self.oracle.timezone())
            .field("state", &*self.state.lock())
            .finish()
    }
}
