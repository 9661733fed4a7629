//! pemsync configuration
//!
//! Settings for the pemsync sidecar are read from the process environment
//! (container-style). This crate turns those variables into a typed
//! [`Settings`] value, resolves the display timezone, and checks the
//! directories the daemon depends on before it starts.
//!
//! # Example
//!
//! ```ignore
//! use pemsync_config::{Settings, validate_startup};
//!
//! let settings = Settings::from_env()?;
//! let result = validate_startup(&settings);
//! if !result.is_valid() {
//!     // refuse to start
//! }
//! ```

mod settings;
mod timezone;
pub mod validate;

pub use settings::{
    OutputTarget, Settings, SettingsError, DEFAULT_COMBINED_FILE_NAME, DEFAULT_CONFIG_PATH,
    DEFAULT_CONFIG_SECTION, DEFAULT_OUTPUT_DIR,
};
pub use timezone::{resolve_timezone, TimezoneResolutionError};
pub use validate::{validate_startup, ValidationResult};
