use std::fmt;
use std::sync::Arc;

use tabfocus_core::{MAX_REVERT_HISTORY, UNDO_TTL_MS};

use crate::archive::DEFAULT_ARCHIVE_RETENTION;
use crate::classify::ClassifierSettings;

/// Wall clock in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Engine-level knobs that are not user settings.
#[derive(Clone)]
pub struct EngineConfig {
    pub classifier: ClassifierSettings,
    pub clock: Clock,
    pub undo_ttl_ms: i64,
    pub archive_retention: usize,
    pub history_capacity: usize,
}

impl EngineConfig {
    pub fn now_ms(&self) -> i64 {
        (self.clock)()
    }

    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierSettings::default(),
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis()),
            undo_ttl_ms: UNDO_TTL_MS,
            archive_retention: DEFAULT_ARCHIVE_RETENTION,
            history_capacity: MAX_REVERT_HISTORY,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("classifier", &self.classifier)
            .field("undo_ttl_ms", &self.undo_ttl_ms)
            .field("archive_retention", &self.archive_retention)
            .field("history_capacity", &self.history_capacity)
            .finish_non_exhaustive()
    }
}

/// `{prefix}_{uuid v4}`, the shape of every id the engine mints.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4())
}
