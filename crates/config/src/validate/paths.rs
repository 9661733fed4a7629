//! Directory validation
//!
//! The input directory and every configured output directory must exist
//! before the daemon starts. Output directories are never created on the
//! fly: a missing mount is an operator error.

use std::path::Path;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::Settings;

/// Validate input and output directories
pub fn validate_paths(settings: &Settings) -> ValidationResult {
    let mut result = ValidationResult::new();

    let input_dir = settings.input_dir();
    if !input_dir.is_dir() {
        result.add_error(ValidationError::new(
            ErrorCategory::Input,
            format!("Input directory not found: {:?}", input_dir),
        ));
    } else if !settings.config_path.exists() {
        // The host application may not have written its config yet
        result.add_warning(ValidationWarning::new(format!(
            "Configuration file not present yet: {:?}",
            settings.config_path
        )));
    }

    for target in &settings.targets {
        check_output_dir(&target.directory, &mut result);
    }

    result
}

fn check_output_dir(dir: &Path, result: &mut ValidationResult) {
    match dir.metadata() {
        Ok(meta) if meta.is_dir() => {
            if meta.permissions().readonly() {
                result.add_warning(ValidationWarning::new(format!(
                    "Output directory is read-only: {:?}",
                    dir
                )));
            }
        }
        Ok(_) => result.add_error(ValidationError::new(
            ErrorCategory::Output,
            format!("Output path is not a directory: {:?}", dir),
        )),
        Err(e) => result.add_error(ValidationError::new(
            ErrorCategory::Output,
            format!("Output directory not found: {:?} ({})", dir, e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutputTarget;
    use tempfile::TempDir;

    fn settings_in(input: &Path, outputs: &[&Path]) -> Settings {
        Settings {
            config_path: input.join("cosmos.config.json"),
            targets: outputs.iter().map(|p| OutputTarget::pair(*p)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_directories() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::write(input.path().join("cosmos.config.json"), "{}").unwrap();

        let result = validate_paths(&settings_in(input.path(), &[output.path()]));

        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_config_file_is_a_warning() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();

        let result = validate_paths(&settings_in(input.path(), &[output.path()]));

        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("not present yet")));
    }

    #[test]
    fn test_missing_input_directory() {
        let output = TempDir::new().unwrap();
        let missing = output.path().join("nope");

        let result = validate_paths(&settings_in(&missing, &[output.path()]));

        assert!(!result.is_valid());
        assert_eq!(result.errors[0].category, ErrorCategory::Input);
    }

    #[test]
    fn test_missing_output_directory() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let missing = output.path().join("gone");

        let result = validate_paths(&settings_in(input.path(), &[output.path(), missing.as_path()]));

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].category, ErrorCategory::Output);
        assert!(result.errors[0].message.contains("gone"));
    }

    #[test]
    fn test_output_path_is_a_file() {
        let input = TempDir::new().unwrap();
        let file = input.path().join("plain");
        std::fs::write(&file, "x").unwrap();

        let result = validate_paths(&settings_in(input.path(), &[file.as_path()]));

        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("not a directory")));
    }
}
