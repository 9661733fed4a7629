//! Change detection
//!
//! Decides whether freshly-read material differs from what was last
//! written. The detector holds no state; the scheduler passes in the
//! [`Baseline`] it owns.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::material::{CertificateMaterial, Fingerprint};

/// What was last written successfully
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    pub fingerprint: Option<Fingerprint>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl Baseline {
    /// Baseline describing `material` after it has been written
    pub fn from_material(material: &CertificateMaterial) -> Self {
        Self {
            fingerprint: Some(material.fingerprint()),
            valid_until: material.declared_valid_until(),
        }
    }

    /// Nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.fingerprint.is_none() && self.valid_until.is_none()
    }
}

/// Outcome of comparing material against a baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeVerdict {
    /// Nothing written yet
    FirstSeen,
    /// Declared `TLSValidUntil` differs from the last written one
    ValidUntilChanged {
        previous: Option<DateTime<Utc>>,
        current: DateTime<Utc>,
    },
    /// Cert/key fingerprint differs from the last written one
    ContentChanged,
    /// Material matches the baseline
    Unchanged,
}

impl ChangeVerdict {
    pub fn is_changed(&self) -> bool {
        !matches!(self, ChangeVerdict::Unchanged)
    }
}

impl fmt::Display for ChangeVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeVerdict::FirstSeen => write!(f, "first-seen"),
            ChangeVerdict::ValidUntilChanged { .. } => write!(f, "valid-until changed"),
            ChangeVerdict::ContentChanged => write!(f, "content changed"),
            ChangeVerdict::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Compares material against a baseline
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    /// Compare `material` with `baseline`
    ///
    /// A declared `TLSValidUntil` is compared by value and the PEM bodies
    /// are not consulted. Without one the fingerprints are compared.
    pub fn detect(material: &CertificateMaterial, baseline: &Baseline) -> ChangeVerdict {
        if baseline.is_empty() {
            return ChangeVerdict::FirstSeen;
        }

        if let Some(current) = material.declared_valid_until() {
            return if baseline.valid_until == Some(current) {
                ChangeVerdict::Unchanged
            } else {
                ChangeVerdict::ValidUntilChanged {
                    previous: baseline.valid_until,
                    current,
                }
            };
        }

        if baseline.fingerprint == Some(material.fingerprint()) {
            ChangeVerdict::Unchanged
        } else {
            ChangeVerdict::ContentChanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_first_seen() {
        let material = CertificateMaterial::new("cert", "key", None);
        assert_eq!(
            ChangeDetector::detect(&material, &Baseline::default()),
            ChangeVerdict::FirstSeen
        );

        let declared = CertificateMaterial::new("cert", "key", Some(at(2030)));
        assert_eq!(
            ChangeDetector::detect(&declared, &Baseline::default()),
            ChangeVerdict::FirstSeen
        );
    }

    #[test]
    fn test_fingerprint_path() {
        let written = CertificateMaterial::new("cert", "key", None);
        let baseline = Baseline::from_material(&written);

        let same = CertificateMaterial::new("cert\r\n", "key", None);
        assert_eq!(ChangeDetector::detect(&same, &baseline), ChangeVerdict::Unchanged);

        let rotated = CertificateMaterial::new("cert", "new key", None);
        assert_eq!(
            ChangeDetector::detect(&rotated, &baseline),
            ChangeVerdict::ContentChanged
        );
    }

    #[test]
    fn test_valid_until_path_skips_content() {
        let written = CertificateMaterial::new("cert", "key", Some(at(2030)));
        let baseline = Baseline::from_material(&written);

        // Only the declared instant is compared
        let same_instant = CertificateMaterial::new("other", "other", Some(at(2030)));
        assert_eq!(
            ChangeDetector::detect(&same_instant, &baseline),
            ChangeVerdict::Unchanged
        );

        let later = CertificateMaterial::new("cert", "key", Some(at(2031)));
        assert_eq!(
            ChangeDetector::detect(&later, &baseline),
            ChangeVerdict::ValidUntilChanged {
                previous: Some(at(2030)),
                current: at(2031),
            }
        );
    }

    #[test]
    fn test_valid_until_appearing_counts_as_change() {
        let written = CertificateMaterial::new("cert", "key", None);
        let baseline = Baseline::from_material(&written);

        let declared = CertificateMaterial::new("cert", "key", Some(at(2030)));
        assert!(ChangeDetector::detect(&declared, &baseline).is_changed());
    }

    #[test]
    fn test_valid_until_disappearing_uses_fingerprint() {
        let written = CertificateMaterial::new("cert", "key", Some(at(2030)));
        let baseline = Baseline::from_material(&written);

        let undeclared = CertificateMaterial::new("cert", "key", None);
        assert_eq!(
            ChangeDetector::detect(&undeclared, &baseline),
            ChangeVerdict::Unchanged
        );
    }
}
