//! Key-value persistence and the typed state kept on top of it.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tabfocus_core::{
    AiRunMeta, ApplySummary, LastRunSummary, PreviewDraft, RevertHistory, RunSnapshot, Settings,
};
use tabfocus_logging::focus_warn;
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

pub const SETTINGS_KEY: &str = "settings";
pub const LAST_RUN_SUMMARY_KEY: &str = "runs.lastSummary";
pub const LAST_AI_META_KEY: &str = "runs.lastAiMeta";
pub const PREVIEW_DRAFT_KEY: &str = "runs.previewDraft";
pub const REVERT_HISTORY_KEY: &str = "runs.revertHistory";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed value for {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
    #[error("could not encode {key}: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        "STORAGE_FAILED"
    }
}

/// Flat JSON key-value storage. Writes are last-write-wins.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Values for the keys that exist; absent keys are omitted.
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    async fn set(&self, values: Map<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let values = self.values();
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        self.values().extend(values);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values().remove(key);
        Ok(())
    }
}

/// One pretty-printed JSON file per key inside a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    writer: AtomicFileWriter,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    fn filename(key: &str) -> String {
        format!("{key}.json")
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let mut found = Map::new();
        for key in keys {
            let path = self.writer.dir().join(Self::filename(key));
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            let value = serde_json::from_str(&text).map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })?;
            found.insert(key.to_string(), value);
        }
        Ok(found)
    }

    async fn set(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        for (key, value) in values {
            let text = serde_json::to_string_pretty(&value)
                .map_err(|source| StoreError::Encode { key: key.clone(), source })?;
            self.writer.write(&Self::filename(&key), &text)?;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.writer.remove(&Self::filename(key))?;
        Ok(())
    }
}

/// Typed accessors for everything the engine persists.
#[derive(Clone)]
pub struct StateStore {
    kv: Arc<dyn KeyValueStore>,
    history_capacity: usize,
}

impl StateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, history_capacity: usize) -> Self {
        Self {
            kv,
            history_capacity,
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut values = self.kv.get(&[key]).await?;
        match values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        let mut values = Map::new();
        values.insert(key.to_string(), value);
        self.kv.set(values).await
    }

    /// Stored settings, with defaults for anything missing or unreadable.
    pub async fn settings(&self) -> Result<Settings, StoreError> {
        match self.read::<Settings>(SETTINGS_KEY).await {
            Ok(settings) => Ok(settings.unwrap_or_default()),
            Err(StoreError::Decode { source, .. }) => {
                focus_warn!("Stored settings unreadable, using defaults: {}", source);
                Ok(Settings::default())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.write(SETTINGS_KEY, settings).await
    }

    pub async fn preview_draft(&self) -> Result<Option<PreviewDraft>, StoreError> {
        self.read(PREVIEW_DRAFT_KEY).await
    }

    pub async fn set_preview_draft(&self, draft: &PreviewDraft) -> Result<(), StoreError> {
        self.write(PREVIEW_DRAFT_KEY, draft).await
    }

    pub async fn clear_preview_draft(&self) -> Result<(), StoreError> {
        self.kv.remove(PREVIEW_DRAFT_KEY).await
    }

    /// Revert history; anything that is not a list of snapshots reads as empty.
    pub async fn revert_history(&self) -> Result<RevertHistory, StoreError> {
        let entries = match self.read::<Vec<RunSnapshot>>(REVERT_HISTORY_KEY).await {
            Ok(entries) => entries.unwrap_or_default(),
            Err(StoreError::Decode { source, .. }) => {
                focus_warn!("Stored revert history unreadable, starting empty: {}", source);
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        Ok(RevertHistory::from_entries(entries, self.history_capacity))
    }

    /// Prepend `snapshot` to the stored history and persist it.
    pub async fn append_snapshot(&self, snapshot: RunSnapshot) -> Result<RevertHistory, StoreError> {
        let mut history = self.revert_history().await?;
        history.push(snapshot);
        self.write(REVERT_HISTORY_KEY, &history.entries()).await?;
        Ok(history)
    }

    /// Fill in the apply outcome of a snapshot already in history.
    pub async fn record_snapshot_summary(
        &self,
        snapshot_id: &str,
        summary: ApplySummary,
    ) -> Result<(), StoreError> {
        let mut history = self.revert_history().await?;
        if !history.record_summary(snapshot_id, summary) {
            focus_warn!("Snapshot {} left history before its summary was recorded", snapshot_id);
            return Ok(());
        }
        self.write(REVERT_HISTORY_KEY, &history.entries()).await
    }

    pub async fn last_run_summary(&self) -> Result<Option<LastRunSummary>, StoreError> {
        self.read(LAST_RUN_SUMMARY_KEY).await
    }

    pub async fn set_last_run_summary(&self, summary: &LastRunSummary) -> Result<(), StoreError> {
        self.write(LAST_RUN_SUMMARY_KEY, summary).await
    }

    pub async fn last_ai_meta(&self) -> Result<Option<AiRunMeta>, StoreError> {
        self.read(LAST_AI_META_KEY).await
    }

    pub async fn set_last_ai_meta(&self, meta: &AiRunMeta) -> Result<(), StoreError> {
        self.write(LAST_AI_META_KEY, meta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabfocus_core::{OrganizeScope, MAX_REVERT_HISTORY};
    use tempfile::TempDir;

    fn snapshot(id: &str) -> RunSnapshot {
        RunSnapshot {
            snapshot_id: id.to_string(),
            created_at: 0,
            tabs: Vec::new(),
            prior_groups: Vec::new(),
            summary: Default::default(),
        }
    }

    #[tokio::test]
    async fn memory_store_round_trips_keys() {
        let store = MemoryStore::new();
        let mut values = Map::new();
        values.insert("a".to_string(), json!(1));
        values.insert("b".to_string(), json!("two"));
        store.set(values).await.unwrap();

        let got = store.get(&["a", "missing"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["a"], json!(1));

        store.remove("a").await.unwrap();
        assert!(store.get(&["a"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        let first = StateStore::new(
            Arc::new(FileStore::new(temp.path().to_path_buf())),
            MAX_REVERT_HISTORY,
        );
        let settings = Settings {
            organize_scope: OrganizeScope::Current,
            ..Settings::default()
        };
        first.save_settings(&settings).await.unwrap();

        let second = StateStore::new(
            Arc::new(FileStore::new(temp.path().to_path_buf())),
            MAX_REVERT_HISTORY,
        );
        assert_eq!(second.settings().await.unwrap(), settings);
        assert!(temp.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn history_is_capped_and_tolerates_garbage() {
        let kv = Arc::new(MemoryStore::new());
        let state = StateStore::new(kv.clone(), MAX_REVERT_HISTORY);

        let mut garbage = Map::new();
        garbage.insert(REVERT_HISTORY_KEY.to_string(), json!({"not": "a list"}));
        kv.set(garbage).await.unwrap();
        assert!(state.revert_history().await.unwrap().entries().is_empty());

        for id in ["s1", "s2", "s3", "s4"] {
            state.append_snapshot(snapshot(id)).await.unwrap();
        }
        let history = state.revert_history().await.unwrap();
        let ids: Vec<&str> = history.entries().iter().map(|s| s.snapshot_id.as_str()).collect();
        assert_eq!(ids, vec!["s4", "s3", "s2"]);
    }

    #[tokio::test]
    async fn summary_is_written_into_stored_snapshot() {
        let state = StateStore::new(Arc::new(MemoryStore::new()), MAX_REVERT_HISTORY);
        state.append_snapshot(snapshot("s1")).await.unwrap();
        let summary = ApplySummary {
            grouped_tabs: 3,
            groups_created: 1,
            skipped_tabs: 0,
        };

        state.record_snapshot_summary("s1", summary).await.unwrap();
        state.record_snapshot_summary("missing", summary).await.unwrap();

        let history = state.revert_history().await.unwrap();
        assert_eq!(history.entries().len(), 1);
        assert_eq!(history.find("s1").unwrap().summary, summary);
    }

    #[tokio::test]
    async fn missing_settings_fall_back_per_field() {
        let kv = Arc::new(MemoryStore::new());
        let mut values = Map::new();
        values.insert(SETTINGS_KEY.to_string(), json!({ "openaiApiKey": "sk-test" }));
        kv.set(values).await.unwrap();

        let settings = StateStore::new(kv, MAX_REVERT_HISTORY).settings().await.unwrap();
        assert_eq!(settings.openai_api_key, "sk-test");
        assert_eq!(settings.model, "gpt-4.1");
    }
}
