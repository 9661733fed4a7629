//! Display timezone resolution
//!
//! The timezone only changes how instants are rendered in log lines. It is
//! resolved purely in-process; host timezone configuration is never touched.

use chrono_tz::Tz;
use thiserror::Error;

/// Timezone name could not be resolved
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown timezone '{name}': {reason}")]
pub struct TimezoneResolutionError {
    /// The name that failed to resolve
    pub name: String,
    /// Resolver message
    pub reason: String,
}

/// Resolve an IANA timezone name (e.g. `Europe/Berlin`)
///
/// An empty name resolves to UTC.
pub fn resolve_timezone(name: &str) -> Result<Tz, TimezoneResolutionError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Tz::UTC);
    }

    name.parse::<Tz>().map_err(|e| TimezoneResolutionError {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_zone() {
        assert_eq!(resolve_timezone("Europe/Berlin").unwrap(), Tz::Europe__Berlin);
        assert_eq!(resolve_timezone(" UTC ").unwrap(), Tz::UTC);
    }

    #[test]
    fn test_resolve_empty_is_utc() {
        assert_eq!(resolve_timezone("").unwrap(), Tz::UTC);
    }

    #[test]
    fn test_resolve_unknown_zone() {
        let err = resolve_timezone("Mars/Olympus_Mons").unwrap_err();
        assert_eq!(err.name, "Mars/Olympus_Mons");
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }
}
