//! Environment-driven daemon settings
//!
//! All settings come from environment variables so the sidecar can be
//! configured from a container manifest. Output targets are either a set of
//! numbered targets (`OUTPUT_DIR_1`, `COMBINED_PEM_1`, ...) or, when none are
//! present, a single fallback target (`OUTPUT_DIR`, `COMBINED_PEM`, ...).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, warn};

use crate::timezone::resolve_timezone;

/// Default location of the host application's configuration document
pub const DEFAULT_CONFIG_PATH: &str = "/input/cosmos.config.json";

/// Default JSON section holding the TLS fields
pub const DEFAULT_CONFIG_SECTION: &str = "HTTPConfig";

/// Default output directory for the fallback single target
pub const DEFAULT_OUTPUT_DIR: &str = "/output/certs";

/// Default file name for combined (key + cert) output
pub const DEFAULT_COMBINED_FILE_NAME: &str = "combined.pem";

/// Default poll interval: no wall-clock polling
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 0;

/// Default bound on a single evaluation started from the async side
const DEFAULT_EVALUATION_TIMEOUT_SECS: u64 = 30;

/// Errors produced while reading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A variable holds a value that cannot be interpreted
    #[error("invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: String,
        value: String,
        reason: &'static str,
    },
}

impl SettingsError {
    fn invalid(var: &str, value: &str, reason: &'static str) -> Self {
        Self::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

/// One destination for extracted certificate material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    /// Directory receiving the files
    pub directory: PathBuf,
    /// Write a single combined file instead of `cert.pem` + `key.pem`
    pub combined: bool,
    /// Name of the combined file (only used when `combined` is set)
    pub combined_file_name: String,
}

impl OutputTarget {
    /// Target writing a separate cert/key pair into `directory`
    pub fn pair(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            combined: false,
            combined_file_name: DEFAULT_COMBINED_FILE_NAME.to_string(),
        }
    }

    /// Target writing one combined file named `file_name` into `directory`
    pub fn combined(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            combined: true,
            combined_file_name: file_name.into(),
        }
    }
}

/// Daemon settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the host configuration document
    pub config_path: PathBuf,
    /// JSON section holding `TLSCert` / `TLSKey` / `TLSValidUntil`
    pub config_section: String,
    /// Forced check interval; zero disables wall-clock polling
    pub check_interval: Duration,
    /// Watch the configuration file for modifications
    pub watch_enabled: bool,
    /// Timezone used when displaying instants
    pub display_timezone: Tz,
    /// Upper bound on one evaluation started from the async side
    pub evaluation_timeout: Duration,
    /// Output targets, in index order
    pub targets: Vec<OutputTarget>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            config_section: DEFAULT_CONFIG_SECTION.to_string(),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            watch_enabled: false,
            display_timezone: Tz::UTC,
            evaluation_timeout: Duration::from_secs(DEFAULT_EVALUATION_TIMEOUT_SECS),
            targets: vec![OutputTarget::pair(DEFAULT_OUTPUT_DIR)],
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_vars(std::env::vars())
    }

    /// Read settings from an arbitrary set of variables
    ///
    /// Unparsable intervals and unknown timezones fall back to their
    /// defaults with a warning; malformed target definitions are errors.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let mut settings = Settings::default();

        if let Some(path) = get("CONFIG_PATH") {
            settings.config_path = PathBuf::from(path);
        }
        if let Some(section) = get("CONFIG_SECTION") {
            settings.config_section = section.to_string();
        }

        settings.check_interval = Duration::from_secs(parse_secs(
            get("CHECK_INTERVAL"),
            "CHECK_INTERVAL",
            DEFAULT_CHECK_INTERVAL_SECS,
        ));
        settings.evaluation_timeout = Duration::from_secs(
            parse_secs(
                get("EVALUATION_TIMEOUT"),
                "EVALUATION_TIMEOUT",
                DEFAULT_EVALUATION_TIMEOUT_SECS,
            )
            .max(1),
        );

        if let Some(value) = get("WATCHDOG_ENABLED") {
            settings.watch_enabled = parse_bool("WATCHDOG_ENABLED", value)?;
        }

        if let Some(name) = get("TZ") {
            settings.display_timezone = match resolve_timezone(name) {
                Ok(tz) => tz,
                Err(e) => {
                    warn!(error = %e, "Falling back to UTC for display timezone");
                    Tz::UTC
                }
            };
        }

        settings.targets = parse_targets(&vars)?;

        debug!(
            config_path = %settings.config_path.display(),
            check_interval_secs = settings.check_interval.as_secs(),
            watch_enabled = settings.watch_enabled,
            target_count = settings.targets.len(),
            "Loaded settings"
        );

        Ok(settings)
    }

    /// Directory containing the configuration document
    pub fn input_dir(&self) -> &Path {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Whether wall-clock polling is enabled
    pub fn polling_enabled(&self) -> bool {
        !self.check_interval.is_zero()
    }
}

fn parse_secs(value: Option<&str>, var: &str, default: u64) -> u64 {
    match value {
        None => default,
        Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
            warn!(var, value = raw, default, "Invalid interval, using default");
            default
        }),
    }
}

fn parse_bool(var: &str, value: &str) -> Result<bool, SettingsError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::invalid(var, value, "expected true/false")),
    }
}

fn validate_file_name(var: &str, name: &str) -> Result<(), SettingsError> {
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(SettingsError::invalid(var, name, "must be a plain file name"));
    }
    Ok(())
}

/// Build one target from the variables sharing `suffix` (`""` or `"_<n>"`)
fn target_from_vars(
    vars: &HashMap<String, String>,
    suffix: &str,
    directory: &str,
) -> Result<OutputTarget, SettingsError> {
    let lookup = |prefix: &str| {
        let var = format!("{prefix}{suffix}");
        let value = vars.get(&var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        (var, value)
    };

    let combined = match lookup("COMBINED_PEM") {
        (var, Some(value)) => parse_bool(&var, &value)?,
        (_, None) => false,
    };

    let combined_file_name = match lookup("COMBINED_FILENAME") {
        (var, Some(name)) => {
            validate_file_name(&var, &name)?;
            name
        }
        (_, None) => DEFAULT_COMBINED_FILE_NAME.to_string(),
    };

    Ok(OutputTarget {
        directory: PathBuf::from(directory),
        combined,
        combined_file_name,
    })
}

fn parse_targets(vars: &HashMap<String, String>) -> Result<Vec<OutputTarget>, SettingsError> {
    let mut numbered = BTreeMap::new();

    for (name, value) in vars {
        let Some(index) = name.strip_prefix("OUTPUT_DIR_") else {
            continue;
        };
        let index: u32 = match index.parse() {
            Ok(i) if i > 0 => i,
            _ => {
                warn!(var = %name, "Ignoring output directory with malformed index");
                continue;
            }
        };
        let directory = value.trim();
        if directory.is_empty() {
            return Err(SettingsError::invalid(name, value, "directory must not be empty"));
        }
        numbered.insert(index, directory.to_string());
    }

    if numbered.is_empty() {
        let directory = vars
            .get("OUTPUT_DIR")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_OUTPUT_DIR);
        return Ok(vec![target_from_vars(vars, "", directory)?]);
    }

    numbered
        .iter()
        .map(|(index, directory)| target_from_vars(vars, &format!("_{index}"), directory))
        .collect()
}
