use tabfocus_core::{GroupColor, GroupId, GroupInfo, HostTab, OrganizeScope, TabId, WindowId};
use thiserror::Error;

/// A failed call into the browser host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct HostError {
    pub operation: &'static str,
    pub message: String,
}

impl HostError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTab {
    pub url: String,
    pub window_id: Option<WindowId>,
    pub index: Option<u32>,
}

/// The browser's tab and tab-group surface.
///
/// Calls are awaited one at a time by the engine; implementations do not
/// need to tolerate concurrent mutation from the same engine.
#[async_trait::async_trait]
pub trait TabHost: Send + Sync {
    async fn query_tabs(&self, scope: OrganizeScope) -> Result<Vec<HostTab>, HostError>;

    async fn group_info(&self, group_id: GroupId) -> Result<GroupInfo, HostError>;

    /// Put `tab_ids` into a new group, created in `window_id` when given.
    async fn group(
        &self,
        tab_ids: &[TabId],
        window_id: Option<WindowId>,
    ) -> Result<GroupId, HostError>;

    async fn update_group(
        &self,
        group_id: GroupId,
        title: &str,
        color: GroupColor,
    ) -> Result<(), HostError>;

    async fn ungroup(&self, tab_ids: &[TabId]) -> Result<(), HostError>;

    async fn close_tab(&self, tab_id: TabId) -> Result<(), HostError>;

    async fn create_tab(&self, request: CreateTab) -> Result<TabId, HostError>;
}
