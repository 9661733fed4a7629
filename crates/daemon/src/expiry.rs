//! Certificate expiry evaluation
//!
//! Reads the X.509 "not after" field of the first certificate in a PEM
//! string. Expiry decisions are made on absolute UTC instants; the
//! configured timezone is only used to render instants for log lines.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{ExtractError, ExtractResult};

/// PEM tag of an X.509 certificate block
const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Display format for expiry instants
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// Result of evaluating a certificate against the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryReport {
    /// `not_after` lies strictly before the evaluation instant
    pub expired: bool,
    /// Certificate's "not after" instant
    pub not_after: DateTime<Utc>,
}

/// Answers "is this certificate expired, and when does it expire?"
#[derive(Debug, Clone, Copy)]
pub struct ExpiryOracle {
    timezone: Tz,
}

impl Default for ExpiryOracle {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl ExpiryOracle {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Evaluate `cert_pem` as of `now`
    pub fn evaluate(&self, cert_pem: &str, now: DateTime<Utc>) -> ExtractResult<ExpiryReport> {
        let not_after = not_after(cert_pem)?;
        Ok(ExpiryReport {
            expired: not_after < now,
            not_after,
        })
    }

    /// Evaluate `cert_pem` against the current time
    pub fn evaluate_now(&self, cert_pem: &str) -> ExtractResult<ExpiryReport> {
        self.evaluate(cert_pem, Utc::now())
    }

    /// Render an instant in the display timezone
    pub fn display(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format(DISPLAY_FORMAT)
            .to_string()
    }
}

/// Extract the "not after" instant of the first certificate in `cert_pem`
pub fn not_after(cert_pem: &str) -> ExtractResult<DateTime<Utc>> {
    let blocks = pem::parse_many(cert_pem)
        .map_err(|e| ExtractError::CertificateParse(format!("malformed PEM: {e}")))?;

    let block = blocks
        .iter()
        .find(|p| p.tag() == CERTIFICATE_TAG)
        .ok_or_else(|| ExtractError::CertificateParse("no CERTIFICATE block found".to_string()))?;

    let (_, cert) = x509_parser::parse_x509_certificate(block.contents())
        .map_err(|e| ExtractError::CertificateParse(format!("invalid X509 certificate: {e}")))?;

    let timestamp = cert.validity().not_after.to_datetime().unix_timestamp();

    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        ExtractError::CertificateParse(format!("not-after out of range: {timestamp}"))
    })
}
