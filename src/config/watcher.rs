//! Hot reload of the breaker table.
//!
//! The parent directory is watched rather than the file itself: editors and config management
//! tools usually replace the file by rename, which a watch on the old inode would miss.
//! Only changes to the `[[breakers]]` table are forwarded; observability and admin settings
//! are read once at startup.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{BreakerEntry, ServiceConfig};

/// Watches one config file and forwards changed breaker tables.
pub struct ConfigWatcher {
    path: PathBuf,
    last: Mutex<Vec<BreakerEntry>>,
    update_tx: mpsc::UnboundedSender<ServiceConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration already applied; reloads equal to it are dropped.
    pub fn new(
        path: &Path,
        current: &ServiceConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            last: Mutex::new(current.breakers.clone()),
            update_tx,
        };
        (watcher, update_rx)
    }

    fn concerns_file(&self, event: &Event) -> bool {
        let file_name: Option<OsString> = self.path.file_name().map(|n| n.to_os_string());
        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_)
        ) && event
            .paths
            .iter()
            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name)
    }

    /// Re-read the file. Returns the new configuration if its breaker table changed.
    ///
    /// Unreadable or invalid files are logged and ignored; the current table stays in force.
    pub fn reload(&self) -> Option<ServiceConfig> {
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Config reload failed, keeping current breakers");
                return None;
            }
        };

        let mut last = self.last.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if *last == config.breakers {
            tracing::debug!(path = ?self.path, "Config touched without breaker changes");
            return None;
        }
        *last = config.breakers.clone();
        Some(config)
    }

    /// Start watching. The returned handle must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if self.concerns_file(&event) => {
                    if let Some(config) = self.reload() {
                        tracing::info!(breakers = config.breakers.len(), "Config change detected");
                        let _ = self.update_tx.send(config);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
