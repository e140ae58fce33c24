//! Capturing the grouping state an apply is about to overwrite, the bounded
//! history of those captures, and planning a revert from one.

use std::collections::{HashMap, HashSet};

use crate::guardrails::MAX_GROUP_NAME_CHARS;
use crate::text::clean_label;
use crate::{
    ApplySummary, GroupColor, GroupId, GroupInfo, HostTab, RevertHistoryEntry, RunSnapshot,
    SnapshotGroup, SnapshotTab, TabId,
};

pub const MAX_REVERT_HISTORY: usize = 3;

/// Prior groups that the tabs in `tab_ids` currently belong to, in first-seen
/// order. The caller resolves their title and color from the host.
pub fn prior_group_ids(tab_ids: &[TabId], live: &[HostTab]) -> Vec<GroupId> {
    let by_id: HashMap<TabId, &HostTab> = live.iter().map(|tab| (tab.id, tab)).collect();
    let mut seen = HashSet::new();
    tab_ids
        .iter()
        .filter_map(|id| by_id.get(id).and_then(|tab| tab.group_id))
        .filter(|group_id| seen.insert(*group_id))
        .collect()
}

/// Record which group each about-to-be-grouped tab belongs to right now.
pub fn capture_snapshot(
    snapshot_id: impl Into<String>,
    created_at: i64,
    tab_ids: &[TabId],
    live: &[HostTab],
    group_info: &HashMap<GroupId, GroupInfo>,
) -> RunSnapshot {
    let by_id: HashMap<TabId, &HostTab> = live.iter().map(|tab| (tab.id, tab)).collect();
    let mut tabs = Vec::with_capacity(tab_ids.len());
    let mut prior_groups: Vec<SnapshotGroup> = Vec::new();

    for &tab_id in tab_ids {
        let prior_group_id = by_id.get(&tab_id).and_then(|tab| tab.group_id);
        tabs.push(SnapshotTab {
            chrome_tab_id: tab_id,
            prior_group_id,
        });
        let Some(group_id) = prior_group_id else {
            continue;
        };
        match prior_groups
            .iter_mut()
            .find(|group| group.old_group_id == Some(group_id))
        {
            Some(group) => group.tab_ids.push(tab_id),
            None => {
                let info = group_info.get(&group_id);
                prior_groups.push(SnapshotGroup {
                    old_group_id: Some(group_id),
                    title: info.map(|i| i.title.clone()).unwrap_or_default(),
                    color: info.and_then(|i| i.color),
                    tab_ids: vec![tab_id],
                });
            }
        }
    }

    RunSnapshot {
        snapshot_id: snapshot_id.into(),
        created_at,
        tabs,
        prior_groups,
        summary: Default::default(),
    }
}

/// Most-recent-first list of snapshots with a fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertHistory {
    entries: Vec<RunSnapshot>,
    capacity: usize,
}

impl RevertHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn from_entries(mut entries: Vec<RunSnapshot>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        entries.truncate(capacity);
        Self { entries, capacity }
    }

    /// Prepend a snapshot, evicting the oldest beyond capacity.
    pub fn push(&mut self, snapshot: RunSnapshot) {
        self.entries.insert(0, snapshot);
        self.entries.truncate(self.capacity);
    }

    pub fn find(&self, snapshot_id: &str) -> Option<&RunSnapshot> {
        self.entries
            .iter()
            .find(|snapshot| snapshot.snapshot_id == snapshot_id)
    }

    /// Attach the apply outcome to a stored snapshot. False when it was evicted.
    pub fn record_summary(&mut self, snapshot_id: &str, summary: ApplySummary) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|snapshot| snapshot.snapshot_id == snapshot_id)
        {
            Some(snapshot) => {
                snapshot.summary = summary;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[RunSnapshot] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<RunSnapshot> {
        self.entries
    }

    pub fn listing(&self) -> Vec<RevertHistoryEntry> {
        self.entries.iter().map(RevertHistoryEntry::from).collect()
    }
}

impl Default for RevertHistory {
    fn default() -> Self {
        Self::new(MAX_REVERT_HISTORY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegroupStep {
    pub title: String,
    pub color: GroupColor,
    pub tab_ids: Vec<TabId>,
}

/// What a revert has to do against the live browser state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertPlan {
    /// Snapshot tabs that are open and currently sit in some group.
    pub to_ungroup: Vec<TabId>,
    /// Prior groups to recreate from their still-open tabs.
    pub regroup: Vec<RegroupStep>,
    /// Open snapshot tabs whose prior state was ungrouped.
    pub restore_ungrouped: Vec<TabId>,
    pub snapshot_tab_count: usize,
}

impl RevertPlan {
    pub fn is_currently_grouped(&self, tab_id: TabId) -> bool {
        self.to_ungroup.contains(&tab_id)
    }
}

/// Plan a revert, or `None` when no snapshot tab is still open.
pub fn plan_revert(snapshot: &RunSnapshot, live: &[HostTab]) -> Option<RevertPlan> {
    let by_id: HashMap<TabId, &HostTab> = live.iter().map(|tab| (tab.id, tab)).collect();
    let open: Vec<&SnapshotTab> = snapshot
        .tabs
        .iter()
        .filter(|tab| by_id.contains_key(&tab.chrome_tab_id))
        .collect();
    if open.is_empty() {
        return None;
    }

    let to_ungroup = open
        .iter()
        .filter(|tab| {
            by_id
                .get(&tab.chrome_tab_id)
                .is_some_and(|live| live.group_id.is_some())
        })
        .map(|tab| tab.chrome_tab_id)
        .collect();
    let restore_ungrouped = open
        .iter()
        .filter(|tab| tab.prior_group_id.is_none())
        .map(|tab| tab.chrome_tab_id)
        .collect();

    let regroup = snapshot
        .prior_groups
        .iter()
        .filter_map(|group| {
            let tab_ids: Vec<TabId> = group
                .tab_ids
                .iter()
                .copied()
                .filter(|id| by_id.contains_key(id))
                .collect();
            if tab_ids.is_empty() {
                return None;
            }
            Some(RegroupStep {
                title: clean_label(&group.title, MAX_GROUP_NAME_CHARS),
                color: group.color.unwrap_or(GroupColor::Grey),
                tab_ids,
            })
        })
        .collect();

    Some(RevertPlan {
        to_ungroup,
        regroup,
        restore_ungrouped,
        snapshot_tab_count: snapshot.tabs.len(),
    })
}
