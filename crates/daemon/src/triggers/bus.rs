//! Trigger bus
//!
//! Unbounded so that producers on non-async threads (the notify callback,
//! the signal thread) never block. Redundant triggers are cheap: the
//! scheduler collapses them.

use tokio::sync::mpsc;
use tracing::trace;

use crate::scheduler::Trigger;

/// Producer handle, cloneable across threads
#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl TriggerSender {
    /// Publish a trigger
    ///
    /// Returns `false` once the dispatcher has stopped.
    pub fn send(&self, trigger: Trigger) -> bool {
        trace!(%trigger, "Publishing trigger");
        self.tx.send(trigger).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer handle
#[derive(Debug)]
pub struct TriggerReceiver {
    rx: mpsc::UnboundedReceiver<Trigger>,
}

impl TriggerReceiver {
    pub async fn recv(&mut self) -> Option<Trigger> {
        self.rx.recv().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<Trigger> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected sender/receiver pair
pub fn trigger_bus() -> (TriggerSender, TriggerReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TriggerSender { tx }, TriggerReceiver { rx })
}
