//! Cross-context propagation of persisted state changes.
//!
//! Each open context watches the file backing its user's key and
//! reloads when another context rewrites it. Delivery is at-least-once
//! and order-preserving per key; intermediate states may be skipped
//! when writes outpace the poll, but the final state always lands.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::{Context as _, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

use crate::state::FolderState;
use crate::storage::{default_data_dir, FileBackend, StorageBackend};

/// Watches one user's persisted state file for rewrites.
///
/// There is no unsubscribe; the watcher lives for the lifetime of the
/// context that created it. Unlike the extension storage API this also
/// fires for the context's own writes, which at-least-once delivery
/// already requires subscribers to tolerate.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<PathBuf>,
    backend: FileBackend,
    key: String,
}

impl StoreWatcher {
    /// Watch `key` under the default gemfold data directory.
    pub fn for_key(key: impl Into<String>) -> Result<Self> {
        Self::new(default_data_dir()?, key)
    }

    /// Watch `key` under an explicit data directory.
    pub fn new(data_dir: PathBuf, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        // The directory must exist before notify can watch it.
        std::fs::create_dir_all(&data_dir).with_context(|| {
            format!("Failed to create data directory: {}", data_dir.display())
        })?;

        let (tx, rx) = mpsc::channel();
        let file_name = format!("{key}.json");

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    // Only care about modifications and creates
                    if event.kind.is_modify() || event.kind.is_create() {
                        for path in event.paths {
                            if path.file_name().is_some_and(|n| n.to_string_lossy() == file_name.as_str()) {
                                let _ = tx.send(path);
                            }
                        }
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_millis(500)),
        )?;

        watcher.watch(&data_dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
            backend: FileBackend::with_dir(data_dir),
            key,
        })
    }

    /// If the key was rewritten since the last poll, reload and return
    /// the new state (non-blocking). Bursts of writes coalesce into one
    /// delivery of whatever is on disk now.
    pub fn try_recv(&self) -> Option<FolderState> {
        let mut changed = false;
        while self.rx.try_recv().is_ok() {
            changed = true;
        }
        if !changed {
            return None;
        }
        match self.reload() {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(key = %self.key, %err, "failed to reload state after change");
                None
            }
        }
    }

    fn reload(&self) -> Result<FolderState> {
        let Some(raw) = self.backend.read(&self.key)? else {
            return Ok(FolderState::default());
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(err) => {
                warn!(key = %self.key, %err, "rewritten state unreadable, treating as empty");
                Ok(FolderState::default())
            }
        }
    }
}
