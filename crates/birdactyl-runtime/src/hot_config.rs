//! Live-reloading YAML configuration.
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize, Default)]
//! struct GuardConfig { max_servers: u32 }
//!
//! let config = HotConfig::open(ctx.data_path("config.yaml")?, GuardConfig::default())?
//!     .on_change(|c| info!(max = c.max_servers, "Config reloaded"));
//! config.watch(HotConfig::<GuardConfig>::DEFAULT_INTERVAL);
//!
//! let max = config.get().max_servers;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{HotConfigError, HotConfigResult};

type ChangeFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    path: PathBuf,
    value: RwLock<Arc<T>>,
    last_modified: Mutex<Option<SystemTime>>,
    on_change: RwLock<Option<ChangeFn<T>>>,
    watcher: Mutex<Option<CancellationToken>>,
}

/// A configuration value backed by a YAML file.
///
/// Clones share the same value, callback and watcher.
pub struct HotConfig<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for HotConfig<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> HotConfig<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Polling interval used by [`HotConfig::watch`] when nothing else is chosen.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// Loads `path`, or writes `default` there if the file does not exist.
    ///
    /// A file that exists but cannot be parsed is reported and the default is
    /// used, leaving the file untouched.
    pub fn open(path: impl Into<PathBuf>, default: T) -> HotConfigResult<Self> {
        let config = Self {
            inner: Arc::new(Inner {
                path: path.into(),
                value: RwLock::new(Arc::new(default)),
                last_modified: Mutex::new(None),
                on_change: RwLock::new(None),
                watcher: Mutex::new(None),
            }),
        };

        if config.inner.path.exists() {
            if let Err(e) = config.reload() {
                error!(path = %config.inner.path.display(), error = %e, "Failed to load config, using defaults");
            }
        } else {
            config.save()?;
        }
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Current value snapshot.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&*self.inner.value.read())
    }

    /// Replaces the value and persists it.
    pub fn set(&self, value: T) -> HotConfigResult<()> {
        *self.inner.value.write() = Arc::new(value);
        self.save()
    }

    /// Writes the current value to disk, creating parent directories.
    pub fn save(&self) -> HotConfigResult<()> {
        let path = &self.inner.path;
        let text = serde_yaml::to_string(&*self.get()).map_err(|e| HotConfigError::yaml(path, e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HotConfigError::io(parent, e))?;
        }
        std::fs::write(path, text).map_err(|e| HotConfigError::io(path, e))?;

        *self.inner.last_modified.lock() = modified_time(path);
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Re-reads the file unconditionally.
    ///
    /// On a parse error the previous value is kept and the error returned.
    /// An empty file also keeps the previous value.
    pub fn reload(&self) -> HotConfigResult<Arc<T>> {
        let path = &self.inner.path;
        let modified = modified_time(path);
        let text = std::fs::read_to_string(path).map_err(|e| HotConfigError::io(path, e))?;
        *self.inner.last_modified.lock() = modified;

        let parsed: Option<T> = serde_yaml::from_str(&text).map_err(|e| HotConfigError::yaml(path, e))?;
        if let Some(value) = parsed {
            *self.inner.value.write() = Arc::new(value);
        }
        Ok(self.get())
    }

    /// Reloads if the file's modification time moved since the last load or
    /// save. Returns true when a new value was applied.
    pub fn reload_if_changed(&self) -> bool {
        let path = &self.inner.path;
        let Some(modified) = modified_time(path) else {
            return false;
        };
        if *self.inner.last_modified.lock() == Some(modified) {
            return false;
        }

        match self.reload() {
            Ok(value) => {
                info!(path = %path.display(), "Config reloaded");
                let callback = self.inner.on_change.read().clone();
                if let Some(f) = callback {
                    f(&value);
                }
                true
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to reload config, keeping previous value");
                false
            }
        }
    }

    /// Sets the callback run after each successful reload from disk.
    pub fn on_change(self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        *self.inner.on_change.write() = Some(Arc::new(f));
        self
    }

    /// Polls the file every `interval` on a background task.
    ///
    /// Must be called within a tokio runtime. Calling it while already
    /// watching does nothing.
    pub fn watch(&self, interval: Duration) {
        let mut watcher = self.inner.watcher.lock();
        if watcher.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *watcher = Some(token.clone());
        drop(watcher);

        let config = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let watched = config.clone();
                        if let Err(e) = tokio::task::spawn_blocking(move || watched.reload_if_changed()).await {
                            warn!(error = %e, "Config reload task failed");
                        }
                    }
                }
            }
            debug!(path = %config.inner.path.display(), "Config watcher stopped");
        });
    }

    pub fn is_watching(&self) -> bool {
        self.inner.watcher.lock().is_some()
    }

    pub fn stop_watching(&self) {
        if let Some(token) = self.inner.watcher.lock().take() {
            token.cancel();
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
