use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::PipelineConfig;
use crate::error::ConfigError;

/// Live-reloadable configuration holder.
///
/// Readers never block; a reload parses and validates the file before the
/// snapshot is swapped, so a bad edit leaves the previous config in place.
pub struct ConfigHandle {
    inner: Arc<ArcSwap<PipelineConfig>>,
    path: PathBuf,
    last_modified: Arc<Mutex<Option<SystemTime>>>,
}

impl ConfigHandle {
    pub fn new(config: PipelineConfig) -> Self {
        let path = config.config_path.clone();
        let last_modified = modified_at(&path);
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
            path,
            last_modified: Arc::new(Mutex::new(last_modified)),
        }
    }

    /// Current snapshot. Lock-free.
    pub fn load(&self) -> arc_swap::Guard<Arc<PipelineConfig>> {
        self.inner.load()
    }

    pub fn load_full(&self) -> Arc<PipelineConfig> {
        self.inner.load_full()
    }

    /// Reload from disk and swap the active snapshot.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let fresh = PipelineConfig::load_from_path(&self.path)?;
        self.inner.store(Arc::new(fresh));
        self.remember_mtime(modified_at(&self.path));
        tracing::info!(path = %self.path.display(), "config.reloaded");
        Ok(())
    }

    /// Reload only when the file's mtime moved. Returns whether a new
    /// snapshot was installed. A failed reload still consumes the mtime, so a
    /// broken file is reported once rather than on every poll.
    pub fn reload_if_modified(&self) -> Result<bool, ConfigError> {
        let current = modified_at(&self.path);
        let changed = {
            let last = self
                .last_modified
                .lock()
                .map_err(|_| ConfigError::Load("config mtime lock poisoned".into()))?;
            current.is_some() && current != *last
        };
        if !changed {
            return Ok(false);
        }
        self.remember_mtime(current);
        self.reload()?;
        Ok(true)
    }

    pub fn store(&self, config: PipelineConfig) {
        self.inner.store(Arc::new(config));
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Poll the config file every `period` until `cancel` fires. Failed
    /// reloads are logged and the previous snapshot stays active.
    pub fn spawn_watcher(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(error) = handle.reload_if_modified() {
                            tracing::warn!(
                                path = %handle.path.display(),
                                error = %error,
                                "config.reload_failed"
                            );
                        }
                    }
                }
            }
        })
    }

    fn remember_mtime(&self, mtime: Option<SystemTime>) {
        if let Ok(mut last) = self.last_modified.lock() {
            *last = mtime;
        }
    }
}

impl Clone for ConfigHandle {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            path: self.path.clone(),
            last_modified: Arc::clone(&self.last_modified),
        }
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
