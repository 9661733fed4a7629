//! Configuration file watching
//!
//! Watches the directory containing the configuration document, not the
//! file itself, so that editors and orchestrators replacing the file via
//! rename are still noticed. Events for other files in the directory are
//! ignored.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::TriggerSender;
use crate::scheduler::Trigger;

/// Live filesystem watch; dropping it stops the notifications
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    directory: PathBuf,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("directory", &self.directory)
            .finish()
    }
}

impl ConfigWatcher {
    /// Start watching `config_path` and publish [`Trigger::FileChanged`]
    ///
    /// Notifications are delivered on the watcher's own thread.
    pub fn start(config_path: &Path, bus: TriggerSender) -> notify::Result<Self> {
        let file_name = config_path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| {
                notify::Error::generic(&format!(
                    "config path has no file name: {}",
                    config_path.display()
                ))
            })?;
        let directory = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_config_event(&event, &file_name) {
                    debug!(kind = ?event.kind, "Configuration file changed");
                    bus.send(Trigger::FileChanged);
                }
            }
            Err(e) => warn!(error = %e, "File watch error"),
        })?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        info!(
            directory = %directory.display(),
            "Watching configuration directory for changes"
        );

        Ok(Self {
            _watcher: watcher,
            directory,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// `true` if `event` creates or modifies the file named `file_name`
pub fn is_config_event(event: &Event, file_name: &OsString) -> bool {
    let relevant_kind = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    relevant_kind
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
