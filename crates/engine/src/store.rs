//! Durable storage for the watch set.
//!
//! Only identifying inputs are persisted: product URLs and order
//! number/email pairs. Resolved stock and status are runtime state and
//! are re-derived by the first check pass after a reload.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::StoreError;

/// Identifier pair for a persisted order watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderKey {
    pub tracking_number: String,
    pub contact_email: String,
}

/// Durable form of the watch set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchFile {
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub orders: Vec<OrderKey>,
}

/// File-backed watch set storage with atomic rewrite.
pub struct WatchStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl WatchStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the watch set. A missing file is an empty set, not an error.
    pub async fn load(&self) -> Result<WatchFile, StoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No watch file yet, starting empty");
                return Ok(WatchFile::default());
            }
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        serde_json::from_str(&raw).map_err(|e| StoreError::Malformed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Persist the watch set.
    ///
    /// The document is written to a sibling temp file and renamed over
    /// the target, so a crash mid-save leaves either the old or the new
    /// file in place, never a torn one. Concurrent saves serialize on
    /// the internal lock.
    pub async fn save(&self, watches: &WatchFile) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let json = serde_json::to_string_pretty(watches).map_err(|e| StoreError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| StoreError::Write {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
        }

        let tmp = tmp_path(&self.path);
        fs::write(&tmp, &json).await.map_err(|e| StoreError::Write {
            path: tmp.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::rename(&tmp, &self.path).await.map_err(|e| StoreError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(
            path = %self.path.display(),
            products = watches.products.len(),
            orders = watches.orders.len(),
            "Watch file saved"
        );
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
