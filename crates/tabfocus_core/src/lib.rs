//! Tabfocus core: pure grouping decisions, draft invariants and undo state.
mod apply;
mod guardrails;
mod heuristic;
mod model;
mod normalize;
mod preview;
mod settings;
mod snapshot;
pub mod text;
pub mod tokens;
mod undo;

pub use apply::{plan_apply, ApplyPlan, PlannedGroup};
pub use guardrails::{
    assess, dominant_domain_ratio, is_generic_name, post_process, Weakness, MAX_GROUP_NAME_CHARS,
    MAX_GROUP_SIZE, MERGE_THRESHOLD, MIN_COHESION, MIN_CONFIDENCE,
};
pub use heuristic::{cluster_tabs, JOIN_THRESHOLD, SINGLETON_REATTACH_THRESHOLD};
pub use model::{
    AiRunMeta, ApplySummary, ArchiveEntry, ArchiveTab, GroupColor, GroupId, GroupInfo,
    GroupSuggestion, HostTab, LastRunSummary, PageContext, PreviewDraft, PreviewGroup,
    RevertHistoryEntry, RunSnapshot, SnapshotGroup, SnapshotTab, Tab, TabId, UndoToken, WindowId,
    GROUP_COLOR_PALETTE,
};
pub use normalize::{
    domain_from_url, is_supported_url, normalize_tabs, normalize_title, MAX_TITLE_CHARS,
    UNKNOWN_DOMAIN, UNTITLED_TAB,
};
pub use preview::{
    build_preview_draft, sanitize_preview_draft, summarize_preview, DraftEditError, MoveTarget,
    PipelineOutcome, PreviewSummary, MAX_RATIONALE_CHARS, MAX_SAMPLE_TITLES,
};
pub use settings::{OrganizeScope, Settings, DEFAULT_FALLBACK_MODEL, DEFAULT_MODEL};
pub use snapshot::{
    capture_snapshot, plan_revert, prior_group_ids, RegroupStep, RevertHistory, RevertPlan,
    MAX_REVERT_HISTORY,
};
pub use undo::{UndoError, UndoSlot, UNDO_TTL_MS};
