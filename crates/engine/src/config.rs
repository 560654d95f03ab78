//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default location of the durable watch file.
pub const DEFAULT_DATA_FILE: &str = "watches.json";
/// Default delay between scheduled check passes.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 120;
/// Consecutive resolution failures before an entity is cooled down.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// A cooled-down entity is attempted once every this many passes.
pub const DEFAULT_FAILURE_COOLDOWN_PASSES: u64 = 5;

/// Tunables for the monitoring engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_file: PathBuf,
    pub check_interval: Duration,
    /// Failure streak at which an entity enters cooldown.
    pub failure_threshold: u32,
    /// Cooldown entities are only attempted on every Nth pass.
    pub failure_cooldown_passes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            failure_cooldown_passes: DEFAULT_FAILURE_COOLDOWN_PASSES,
        }
    }
}
