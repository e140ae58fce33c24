//! Front-end commands and the dispatcher that runs them.
//!
//! Every command produces a JSON reply shaped `{"ok": true, ...}` or
//! `{"ok": false, "error": CODE, "message": ...}`.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tabfocus_core::{
    build_preview_draft, normalize_tabs, plan_apply, sanitize_preview_draft, LastRunSummary,
    PreviewDraft, Settings, TabId, UndoError, UndoSlot,
};
use tabfocus_logging::{focus_info, focus_warn};
use thiserror::Error;

use crate::apply::execute_apply;
use crate::archive::{
    archive_and_close, restore_archive, ArchiveRequest, ArchiveStore, DEFAULT_LIST_LIMIT,
};
use crate::classify::{Classifier, OpenAiClassifier};
use crate::config::{new_id, EngineConfig};
use crate::enrich::PageReader;
use crate::host::{HostError, TabHost};
use crate::pipeline::build_groups;
use crate::revert::{capture_live_snapshot, execute_revert, RevertError};
use crate::store::{KeyValueStore, StateStore, StoreError};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Command {
    GeneratePreview,
    GetPreview,
    /// Apply the stored draft, or `draft` when the user edited it.
    ///
    /// The edited draft stays raw JSON so that a malformed one is reported
    /// as an invalid draft rather than an invalid command.
    ApplyPreview {
        #[serde(default)]
        draft: Option<Value>,
    },
    DiscardPreview,
    GetRevertHistory,
    RevertSnapshot {
        snapshot_id: String,
    },
    CloseTab {
        tab_id: TabId,
    },
    ArchiveTabs(ArchiveRequest),
    UndoArchive {
        #[serde(default)]
        token_id: Option<String>,
    },
    GetLastRun,
    GetSettings,
    SaveSettings {
        settings: Settings,
    },
    ListArchives {
        #[serde(default)]
        limit: Option<usize>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GeneratePreview => "GENERATE_PREVIEW",
            Command::GetPreview => "GET_PREVIEW",
            Command::ApplyPreview { .. } => "APPLY_PREVIEW",
            Command::DiscardPreview => "DISCARD_PREVIEW",
            Command::GetRevertHistory => "GET_REVERT_HISTORY",
            Command::RevertSnapshot { .. } => "REVERT_SNAPSHOT",
            Command::CloseTab { .. } => "CLOSE_TAB",
            Command::ArchiveTabs(_) => "ARCHIVE_TABS",
            Command::UndoArchive { .. } => "UNDO_ARCHIVE",
            Command::GetLastRun => "GET_LAST_RUN",
            Command::GetSettings => "GET_SETTINGS",
            Command::SaveSettings { .. } => "SAVE_SETTINGS",
            Command::ListArchives { .. } => "LIST_ARCHIVES",
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no preview draft to apply")]
    NoPreviewDraft,
    #[error("preview draft has no tabs")]
    InvalidPreviewDraft,
    #[error("snapshot {0} not found")]
    SnapshotNotFound(String),
    #[error("none of the snapshot's tabs are still open")]
    NoOpenTabsFromSnapshot,
    #[error(transparent)]
    Undo(#[from] UndoError),
    #[error("archive {0} not found")]
    ArchiveNotFound(String),
    #[error("closing tab failed: {0}")]
    TabCloseFailed(HostError),
    #[error("tab query failed: {0}")]
    TabQueryFailed(HostError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("no tabs to organize")]
    NoTabsToOrganize,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl CommandError {
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::NoPreviewDraft => "NO_PREVIEW_DRAFT",
            CommandError::InvalidPreviewDraft => "INVALID_PREVIEW_DRAFT",
            CommandError::SnapshotNotFound(_) => "SNAPSHOT_NOT_FOUND",
            CommandError::NoOpenTabsFromSnapshot => "NO_OPEN_TABS_FROM_SNAPSHOT",
            CommandError::Undo(err) => err.code(),
            CommandError::ArchiveNotFound(_) => "ARCHIVE_NOT_FOUND",
            CommandError::TabCloseFailed(_) => "TAB_CLOSE_FAILED",
            CommandError::TabQueryFailed(_) => "TAB_QUERY_FAILED",
            CommandError::Storage(err) => err.code(),
            CommandError::NoTabsToOrganize => "NO_TABS_TO_ORGANIZE",
            CommandError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    pub fn to_reply(&self) -> Value {
        json!({ "ok": false, "error": self.code(), "message": self.to_string() })
    }
}

/// Owns the collaborators and the process-lifetime undo slot.
pub struct FocusEngine {
    host: Arc<dyn TabHost>,
    classifier: Arc<dyn Classifier>,
    pages: Arc<dyn PageReader>,
    state: StateStore,
    archives: Arc<dyn ArchiveStore>,
    config: EngineConfig,
    undo: UndoSlot,
}

impl FocusEngine {
    pub fn new(
        host: Arc<dyn TabHost>,
        classifier: Arc<dyn Classifier>,
        pages: Arc<dyn PageReader>,
        kv: Arc<dyn KeyValueStore>,
        archives: Arc<dyn ArchiveStore>,
        config: EngineConfig,
    ) -> Self {
        let state = StateStore::new(kv, config.history_capacity);
        Self {
            host,
            classifier,
            pages,
            state,
            archives,
            config,
            undo: UndoSlot::new(),
        }
    }

    /// Engine backed by the OpenAI classifier built from `config.classifier`.
    pub fn with_openai(
        host: Arc<dyn TabHost>,
        pages: Arc<dyn PageReader>,
        kv: Arc<dyn KeyValueStore>,
        archives: Arc<dyn ArchiveStore>,
        config: EngineConfig,
    ) -> Self {
        let classifier = Arc::new(OpenAiClassifier::new(config.classifier.clone()));
        Self::new(host, classifier, pages, kv, archives, config)
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Decode a raw JSON command and run it.
    pub async fn handle_value(&mut self, raw: Value) -> Value {
        match serde_json::from_value::<Command>(raw) {
            Ok(command) => self.handle(command).await,
            Err(err) => CommandError::InvalidRequest(err.to_string()).to_reply(),
        }
    }

    pub async fn handle(&mut self, command: Command) -> Value {
        let name = command.name();
        match self.dispatch(command).await {
            Ok(reply) => {
                focus_info!("{} ok", name);
                reply
            }
            Err(err) => {
                focus_warn!("{} failed: {}", name, err);
                err.to_reply()
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Value, CommandError> {
        match command {
            Command::GeneratePreview => self.generate_preview().await,
            Command::GetPreview => self.get_preview().await,
            Command::ApplyPreview { draft } => self.apply_preview(draft).await,
            Command::DiscardPreview => {
                self.state.clear_preview_draft().await?;
                Ok(json!({ "ok": true }))
            }
            Command::GetRevertHistory => {
                let history = self.state.revert_history().await?;
                Ok(json!({ "ok": true, "history": history.listing() }))
            }
            Command::RevertSnapshot { snapshot_id } => self.revert(&snapshot_id).await,
            Command::CloseTab { tab_id } => {
                self.host
                    .close_tab(tab_id)
                    .await
                    .map_err(CommandError::TabCloseFailed)?;
                Ok(json!({ "ok": true, "tabId": tab_id }))
            }
            Command::ArchiveTabs(request) => self.archive(request).await,
            Command::UndoArchive { token_id } => self.undo_archive(token_id.as_deref()).await,
            Command::GetLastRun => {
                let summary = self.state.last_run_summary().await?;
                let ai_meta = self.state.last_ai_meta().await?;
                Ok(json!({ "ok": true, "summary": summary, "aiMeta": ai_meta }))
            }
            Command::GetSettings => {
                let settings = self.state.settings().await?;
                Ok(json!({ "ok": true, "settings": settings }))
            }
            Command::SaveSettings { settings } => {
                self.state.save_settings(&settings).await?;
                Ok(json!({ "ok": true, "settings": settings }))
            }
            Command::ListArchives { limit } => {
                let archives = self
                    .archives
                    .list_recent(limit.unwrap_or(DEFAULT_LIST_LIMIT))
                    .await?;
                Ok(json!({ "ok": true, "archives": archives }))
            }
        }
    }

    async fn generate_preview(&mut self) -> Result<Value, CommandError> {
        let settings = self.state.settings().await?;
        let raw = self
            .host
            .query_tabs(settings.organize_scope)
            .await
            .map_err(CommandError::TabQueryFailed)?;
        let tabs = normalize_tabs(&raw, settings.include_full_url);
        if tabs.is_empty() {
            return Err(CommandError::NoTabsToOrganize);
        }

        let outcome = build_groups(
            tabs,
            &settings,
            self.classifier.as_ref(),
            self.pages.as_ref(),
        )
        .await;
        let draft = build_preview_draft(new_id("draft"), self.config.now_ms(), outcome)
            .ok_or(CommandError::NoTabsToOrganize)?;

        self.state.set_preview_draft(&draft).await?;
        if let Some(meta) = &draft.ai_meta {
            self.state.set_last_ai_meta(meta).await?;
        }
        Ok(json!({ "ok": true, "draft": draft, "summary": draft.summary() }))
    }

    async fn get_preview(&self) -> Result<Value, CommandError> {
        let draft = self.state.preview_draft().await?;
        let summary = draft.as_ref().map(PreviewDraft::summary);
        Ok(json!({ "ok": true, "draft": draft, "summary": summary }))
    }

    async fn apply_preview(&mut self, edited: Option<Value>) -> Result<Value, CommandError> {
        let candidate = match edited {
            Some(raw) => serde_json::from_value::<PreviewDraft>(raw).map_err(|err| {
                focus_warn!("Edited draft rejected: {}", err);
                CommandError::InvalidPreviewDraft
            })?,
            None => self
                .state
                .preview_draft()
                .await?
                .ok_or(CommandError::NoPreviewDraft)?,
        };
        let draft = sanitize_preview_draft(&candidate).ok_or(CommandError::InvalidPreviewDraft)?;
        let settings = self.state.settings().await?;
        let plan = plan_apply(&draft.tabs, &draft.groups, settings.allow_cross_window_grouping);

        let snapshot = capture_live_snapshot(
            self.host.as_ref(),
            new_id("snapshot"),
            self.config.now_ms(),
            &plan.planned_tab_ids(),
        )
        .await
        .map_err(CommandError::TabQueryFailed)?;
        let snapshot_id = snapshot.snapshot_id.clone();
        // Nothing moves until the way back is stored.
        self.state.append_snapshot(snapshot).await?;

        let summary = execute_apply(self.host.as_ref(), &plan).await;

        // Tabs are already regrouped, so later write failures only warn.
        let mut warnings = Vec::new();
        if let Err(err) = self.state.record_snapshot_summary(&snapshot_id, summary).await {
            focus_warn!("Recording summary on {} failed: {}", snapshot_id, err);
            warnings.push(format!("snapshot summary not saved: {err}"));
        }
        let last_run = LastRunSummary {
            completed_at: self.config.now_ms(),
            draft_id: draft.draft_id.clone(),
            snapshot_id: snapshot_id.clone(),
            summary,
            used_fallback: draft.used_fallback,
        };
        if let Err(err) = self.state.set_last_run_summary(&last_run).await {
            focus_warn!("Saving last run failed: {}", err);
            warnings.push(format!("last run not saved: {err}"));
        }
        if let Err(err) = self.state.clear_preview_draft().await {
            focus_warn!("Clearing applied draft failed: {}", err);
            warnings.push(format!("preview draft not cleared: {err}"));
        }

        Ok(json!({
            "ok": true,
            "summary": summary,
            "snapshotId": snapshot_id,
            "warnings": warnings,
        }))
    }

    async fn revert(&mut self, snapshot_id: &str) -> Result<Value, CommandError> {
        let history = self.state.revert_history().await?;
        let snapshot = history
            .find(snapshot_id)
            .ok_or_else(|| CommandError::SnapshotNotFound(snapshot_id.to_string()))?;
        let outcome = execute_revert(self.host.as_ref(), snapshot)
            .await
            .map_err(|err| match err {
                RevertError::NoOpenTabs => CommandError::NoOpenTabsFromSnapshot,
                RevertError::Host(err) => CommandError::TabQueryFailed(err),
            })?;
        Ok(json!({
            "ok": true,
            "snapshotId": snapshot_id,
            "restoredTabs": outcome.restored_tabs,
            "restoredGroups": outcome.restored_groups,
            "skippedTabs": outcome.skipped_tabs,
        }))
    }

    async fn archive(&mut self, request: ArchiveRequest) -> Result<Value, CommandError> {
        if request.tabs.is_empty() {
            return Err(CommandError::InvalidRequest("no tabs to archive".to_string()));
        }
        let now = self.config.now_ms();
        let outcome = archive_and_close(
            self.host.as_ref(),
            self.archives.as_ref(),
            new_id("archive"),
            now,
            request,
            self.config.archive_retention,
        )
        .await?;
        let token = self.undo.issue(
            new_id("undo"),
            outcome.archive_id.clone(),
            now,
            self.config.undo_ttl_ms,
        );
        Ok(json!({
            "ok": true,
            "archiveId": outcome.archive_id,
            "closedCount": outcome.closed_count,
            "failedTabIds": outcome.failed_tab_ids,
            "undoToken": token,
        }))
    }

    async fn undo_archive(&mut self, token_id: Option<&str>) -> Result<Value, CommandError> {
        let token = self.undo.redeem(token_id, self.config.now_ms())?;
        let entry = self
            .archives
            .get(&token.archive_id)
            .await?
            .ok_or_else(|| CommandError::ArchiveNotFound(token.archive_id.clone()))?;
        let outcome = restore_archive(self.host.as_ref(), &entry).await;
        Ok(json!({
            "ok": true,
            "archiveId": entry.archive_id,
            "restoredCount": outcome.restored_count,
            "skippedCount": outcome.skipped_count,
        }))
    }
}
