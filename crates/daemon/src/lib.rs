//! pemsync daemon library
//!
//! Extracts the TLS certificate and private key embedded in a host
//! application's JSON configuration and keeps PEM files on disk in sync
//! with it.
//!
//! # Components
//!
//! - [`CertificateMaterial`] - cert/key pair plus fingerprint and declared expiry
//! - [`ExpiryOracle`] - reads the certificate's not-after instant
//! - [`ChangeDetector`] - compares fresh material against the last write
//! - [`RenewalScheduler`] - serializes triggers and decides when to write
//! - [`FileSink`] - atomically writes PEM files to every output target
//! - [`triggers`] - file watch, ticker and signal producers feeding the scheduler
//!
//! # Flow
//!
//! ```text
//! notify ──┐
//! ticker ──┼──▶ TriggerBus ──▶ dispatch ──▶ RenewalScheduler::trigger
//! signals ─┘                                   │
//!                              load ─▶ detect/expiry ─▶ FileSink::write
//! ```

pub mod detector;
pub mod error;
pub mod expiry;
pub mod material;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod triggers;

use std::sync::Arc;

use pemsync_config::Settings;

pub use detector::{Baseline, ChangeDetector, ChangeVerdict};
pub use error::{ExtractError, ExtractResult};
pub use expiry::{ExpiryOracle, ExpiryReport};
pub use material::{CertificateMaterial, Fingerprint};
pub use scheduler::{EvaluationOutcome, Phase, RenewReason, RenewalScheduler, Trigger};
pub use sink::{FileSink, OutputSink, WriteReport};
pub use source::{ConfigLoader, FileConfigLoader};

/// Build a scheduler wired to the file loader and sink described by `settings`
pub fn build_scheduler(settings: &Settings) -> RenewalScheduler {
    let loader = FileConfigLoader::new(&settings.config_path, &settings.config_section);
    let sink = FileSink::new(settings.targets.clone());
    RenewalScheduler::new(
        Arc::new(loader),
        Arc::new(sink),
        ExpiryOracle::new(settings.display_timezone),
    )
}
