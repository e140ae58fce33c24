//! Tabfocus engine: browser-facing I/O, classification and command execution.
mod apply;
mod archive;
mod classify;
mod commands;
mod config;
mod engine;
mod enrich;
mod host;
mod persist;
mod pipeline;
mod prompt;
mod response;
mod revert;
mod store;

pub use apply::execute_apply;
pub use archive::{
    archive_and_close, clamp_list_limit, restore_archive, sanitize_archive_tab, ArchiveOutcome,
    ArchiveRequest, ArchiveStore, FileArchiveStore, MemoryArchiveStore, RestoreOutcome,
    DEFAULT_ARCHIVE_REASON, DEFAULT_ARCHIVE_RETENTION, DEFAULT_LIST_LIMIT,
    MAX_ARCHIVE_TITLE_CHARS, MAX_LIST_LIMIT,
};
pub use classify::{
    Classifier, ClassifierSettings, ClassifyError, ClassifyFailure, ClassifyOutput,
    OpenAiClassifier, DEFAULT_ENDPOINT,
};
pub use commands::{Command, CommandError, FocusEngine};
pub use config::{new_id, Clock, EngineConfig};
pub use engine::{EngineHandle, EngineStopped};
pub use enrich::{
    ambiguous_tab_indices, enrich_tabs, site_hints, Enrichment, NoPageAccess, PageExtract,
    PageReader, AMBIGUOUS_CONFIDENCE, AMBIGUOUS_DOMAIN_RATIO, AMBIGUOUS_GROUP_SIZE,
    MAX_ENRICHED_TABS,
};
pub use host::{CreateTab, HostError, TabHost};
pub use persist::{ensure_state_dir, AtomicFileWriter, PersistError};
pub use pipeline::build_groups;
pub use prompt::{build_request, describe_tabs};
pub use response::{parse_completion, MAX_AI_GROUP_NAME_CHARS};
pub use revert::{capture_live_snapshot, execute_revert, RevertError, RevertOutcome};
pub use store::{
    FileStore, KeyValueStore, MemoryStore, StateStore, StoreError, LAST_AI_META_KEY,
    LAST_RUN_SUMMARY_KEY, PREVIEW_DRAFT_KEY, REVERT_HISTORY_KEY, SETTINGS_KEY,
};
