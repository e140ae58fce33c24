//! Batch tab archiving: persist what is about to close, close it, and bring
//! it back on undo.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tabfocus_core::text::clamp_chars;
use tabfocus_core::{ArchiveEntry, ArchiveTab, TabId, UNKNOWN_DOMAIN, UNTITLED_TAB};
use tabfocus_logging::{focus_info, focus_warn};

use crate::host::{CreateTab, TabHost};
use crate::persist::AtomicFileWriter;
use crate::store::StoreError;

pub const MAX_ARCHIVE_TITLE_CHARS: usize = 220;
pub const DEFAULT_ARCHIVE_RETENTION: usize = 1000;
pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 200;
pub const DEFAULT_ARCHIVE_REASON: &str = "manual";

/// Clamp a requested listing size into `1..=200`.
pub fn clamp_list_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIST_LIMIT)
}

#[async_trait::async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn save(&self, entry: &ArchiveEntry) -> Result<(), StoreError>;

    async fn get(&self, archive_id: &str) -> Result<Option<ArchiveEntry>, StoreError>;

    /// Newest first, at most `clamp_list_limit(limit)` entries.
    async fn list_recent(&self, limit: usize) -> Result<Vec<ArchiveEntry>, StoreError>;

    /// Delete the oldest entries beyond `max_entries`; returns how many went.
    async fn prune(&self, max_entries: usize) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryArchiveStore {
    entries: Mutex<Vec<ArchiveEntry>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Vec<ArchiveEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Newest first; equal timestamps keep later saves ahead of earlier ones.
fn newest_first(entries: &[ArchiveEntry]) -> Vec<ArchiveEntry> {
    let mut sorted: Vec<ArchiveEntry> = entries.iter().rev().cloned().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
}

#[async_trait::async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn save(&self, entry: &ArchiveEntry) -> Result<(), StoreError> {
        let mut entries = self.entries();
        entries.retain(|existing| existing.archive_id != entry.archive_id);
        entries.push(entry.clone());
        Ok(())
    }

    async fn get(&self, archive_id: &str) -> Result<Option<ArchiveEntry>, StoreError> {
        Ok(self
            .entries()
            .iter()
            .find(|entry| entry.archive_id == archive_id)
            .cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ArchiveEntry>, StoreError> {
        let mut sorted = newest_first(&self.entries());
        sorted.truncate(clamp_list_limit(limit));
        Ok(sorted)
    }

    async fn prune(&self, max_entries: usize) -> Result<usize, StoreError> {
        let mut entries = self.entries();
        let keep: Vec<String> = newest_first(&entries)
            .into_iter()
            .take(max_entries.max(1))
            .map(|entry| entry.archive_id)
            .collect();
        let before = entries.len();
        entries.retain(|entry| keep.contains(&entry.archive_id));
        Ok(before - entries.len())
    }
}

/// One JSON file per archive entry in a directory.
#[derive(Debug, Clone)]
pub struct FileArchiveStore {
    writer: AtomicFileWriter,
}

impl FileArchiveStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    /// Bytes outside `[A-Za-z0-9_-]` become `%XX`, so distinct ids never
    /// share a file.
    fn filename(archive_id: &str) -> String {
        let mut name = String::with_capacity(archive_id.len() + 5);
        for byte in archive_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("%{byte:02X}"));
            }
        }
        name.push_str(".json");
        name
    }

    fn load_all(&self) -> Result<Vec<ArchiveEntry>, StoreError> {
        let dir = self.writer.dir();
        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut entries = Vec::new();
        for item in listing {
            let path = item?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            match serde_json::from_str::<ArchiveEntry>(&text) {
                Ok(entry) => entries.push(entry),
                Err(err) => focus_warn!("Skipping unreadable archive {}: {}", path.display(), err),
            }
        }
        // Directory order is arbitrary; fall back to id for equal timestamps.
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.archive_id.cmp(&a.archive_id))
        });
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl ArchiveStore for FileArchiveStore {
    async fn save(&self, entry: &ArchiveEntry) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(entry).map_err(|source| StoreError::Encode {
            key: entry.archive_id.clone(),
            source,
        })?;
        self.writer.write(&Self::filename(&entry.archive_id), &text)?;
        Ok(())
    }

    async fn get(&self, archive_id: &str) -> Result<Option<ArchiveEntry>, StoreError> {
        let path = self.writer.dir().join(Self::filename(archive_id));
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: archive_id.to_string(),
                source,
            })
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ArchiveEntry>, StoreError> {
        let mut entries = self.load_all()?;
        entries.truncate(clamp_list_limit(limit));
        Ok(entries)
    }

    async fn prune(&self, max_entries: usize) -> Result<usize, StoreError> {
        let entries = self.load_all()?;
        let mut removed = 0;
        for entry in entries.iter().skip(max_entries.max(1)) {
            self.writer.remove(&Self::filename(&entry.archive_id))?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// Tab record as supplied by a caller, before cleanup.
pub fn sanitize_archive_tab(tab: &ArchiveTab) -> ArchiveTab {
    let title = clamp_chars(&tab.title, MAX_ARCHIVE_TITLE_CHARS);
    ArchiveTab {
        chrome_tab_id: tab.chrome_tab_id,
        title: if title.trim().is_empty() {
            UNTITLED_TAB.to_string()
        } else {
            title
        },
        url: tab.url.clone().filter(|url| !url.trim().is_empty()),
        domain: if tab.domain.trim().is_empty() {
            UNKNOWN_DOMAIN.to_string()
        } else {
            tab.domain.clone()
        },
        window_id: tab.window_id,
        tab_index: tab.tab_index,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRequest {
    #[serde(default)]
    pub tabs: Vec<ArchiveTab>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub draft_id: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutcome {
    pub archive_id: String,
    pub closed_count: usize,
    pub failed_tab_ids: Vec<TabId>,
}

/// Persist the entry, then close its tabs one by one.
///
/// A failed save aborts before anything closes. Retention pruning afterwards
/// is best-effort.
pub async fn archive_and_close(
    host: &dyn TabHost,
    store: &dyn ArchiveStore,
    archive_id: String,
    created_at: i64,
    request: ArchiveRequest,
    retention: usize,
) -> Result<ArchiveOutcome, StoreError> {
    let entry = ArchiveEntry {
        archive_id: archive_id.clone(),
        created_at,
        reason: request
            .reason
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_REASON.to_string()),
        tabs: request.tabs.iter().map(sanitize_archive_tab).collect(),
        draft_id: request.draft_id,
        group_name: request.group_name,
    };
    store.save(&entry).await?;

    let mut closed_count = 0;
    let mut failed_tab_ids = Vec::new();
    for tab_id in entry.tabs.iter().filter_map(|tab| tab.chrome_tab_id) {
        match host.close_tab(tab_id).await {
            Ok(()) => closed_count += 1,
            Err(err) => {
                focus_warn!("Closing tab {} failed: {}", tab_id, err);
                failed_tab_ids.push(tab_id);
            }
        }
    }

    match store.prune(retention).await {
        Ok(0) => {}
        Ok(pruned) => focus_info!("Pruned {} old archives", pruned),
        Err(err) => focus_warn!("Archive pruning failed: {}", err),
    }

    Ok(ArchiveOutcome {
        archive_id,
        closed_count,
        failed_tab_ids,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub restored_count: usize,
    pub skipped_count: usize,
}

/// Re-open an archive's tabs by URL, at their old window and position when
/// the host still accepts it.
pub async fn restore_archive(host: &dyn TabHost, entry: &ArchiveEntry) -> RestoreOutcome {
    let mut outcome = RestoreOutcome::default();
    for tab in &entry.tabs {
        let Some(url) = tab.url.clone() else {
            outcome.skipped_count += 1;
            continue;
        };
        let placed = CreateTab {
            url: url.clone(),
            window_id: tab.window_id,
            index: Some(tab.tab_index),
        };
        let result = match host.create_tab(placed).await {
            Ok(id) => Ok(id),
            Err(err) => {
                focus_warn!("Restoring {} in its old window failed: {}", url, err);
                host.create_tab(CreateTab {
                    url,
                    window_id: None,
                    index: None,
                })
                .await
            }
        };
        match result {
            Ok(_) => outcome.restored_count += 1,
            Err(err) => {
                focus_warn!("Restoring archived tab failed: {}", err);
                outcome.skipped_count += 1;
            }
        }
    }
    outcome
}
