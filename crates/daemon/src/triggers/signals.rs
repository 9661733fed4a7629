//! Signal handling for renewal requests and shutdown
//!
//! SIGHUP and SIGUSR1 request an immediate renewal; SIGINT and SIGTERM
//! request one final renewal followed by exit. Signals are received on a
//! dedicated thread and forwarded to the trigger bus.

use std::io;
use std::thread;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;
use tracing::{debug, info};

use super::TriggerSender;
use crate::scheduler::Trigger;

/// What a received signal asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    /// Renew now (SIGHUP/SIGUSR1)
    Renew,
    /// Final renewal, then exit (SIGTERM/SIGINT)
    Shutdown,
}

impl SignalType {
    fn trigger(self) -> Trigger {
        match self {
            SignalType::Renew => Trigger::Manual,
            SignalType::Shutdown => Trigger::Shutdown,
        }
    }
}

/// Map a raw signal number to its meaning
pub fn classify_signal(signal: i32) -> Option<SignalType> {
    match signal {
        SIGHUP | SIGUSR1 => Some(SignalType::Renew),
        SIGTERM | SIGINT => Some(SignalType::Shutdown),
        _ => None,
    }
}

/// Install handlers and forward signals to `bus` from a background thread
pub fn spawn_signal_listener(bus: TriggerSender) -> io::Result<()> {
    let mut signals = Signals::new([SIGTERM, SIGINT, SIGHUP, SIGUSR1])?;

    thread::Builder::new()
        .name("pemsync-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                let Some(kind) = classify_signal(signal) else {
                    continue;
                };
                debug!(signal, kind = ?kind, "Received signal");

                match kind {
                    SignalType::Renew => {
                        info!("Received renewal signal, renewing certificates");
                        if !bus.send(kind.trigger()) {
                            break;
                        }
                    }
                    SignalType::Shutdown => {
                        info!("Received interrupt signal, renewing once before exit");
                        bus.send(kind.trigger());
                        break;
                    }
                }
            }
        })?;

    Ok(())
}
