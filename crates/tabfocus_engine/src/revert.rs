//! Capturing live grouping state before an apply and restoring it later.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tabfocus_core::{
    capture_snapshot, plan_revert, prior_group_ids, GroupInfo, HostTab, OrganizeScope,
    RunSnapshot, TabId,
};
use tabfocus_logging::{focus_debug, focus_warn};
use thiserror::Error;

use crate::host::{HostError, TabHost};

/// Snapshot the groups that `tab_ids` belong to right now.
///
/// Groups whose details cannot be read are recorded untitled.
pub async fn capture_live_snapshot(
    host: &dyn TabHost,
    snapshot_id: String,
    created_at: i64,
    tab_ids: &[TabId],
) -> Result<RunSnapshot, HostError> {
    let live = host.query_tabs(OrganizeScope::All).await?;
    let mut group_info: HashMap<_, GroupInfo> = HashMap::new();
    for group_id in prior_group_ids(tab_ids, &live) {
        match host.group_info(group_id).await {
            Ok(info) => {
                group_info.insert(group_id, info);
            }
            Err(err) => focus_warn!("Group {} details unavailable: {}", group_id, err),
        }
    }
    Ok(capture_snapshot(snapshot_id, created_at, tab_ids, &live, &group_info))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertOutcome {
    pub restored_tabs: usize,
    pub restored_groups: usize,
    pub skipped_tabs: usize,
}

#[derive(Debug, Error)]
pub enum RevertError {
    #[error("none of the snapshot's tabs are still open")]
    NoOpenTabs,
    #[error(transparent)]
    Host(HostError),
}

/// Put snapshot tabs back the way they were grouped. Never closes tabs.
pub async fn execute_revert(
    host: &dyn TabHost,
    snapshot: &RunSnapshot,
) -> Result<RevertOutcome, RevertError> {
    let live: Vec<HostTab> = host
        .query_tabs(OrganizeScope::All)
        .await
        .map_err(RevertError::Host)?;
    let plan = plan_revert(snapshot, &live).ok_or(RevertError::NoOpenTabs)?;

    let ungrouped = ungroup_tabs(host, &plan.to_ungroup).await;

    let mut restored_tabs = 0;
    let mut restored_groups = 0;
    for step in &plan.regroup {
        let group_id = match host.group(&step.tab_ids, None).await {
            Ok(group_id) => group_id,
            Err(err) => {
                focus_warn!("Recreating group '{}' failed: {}", step.title, err);
                continue;
            }
        };
        if let Err(err) = host.update_group(group_id, &step.title, step.color).await {
            focus_warn!("Restoring title of group {} failed: {}", group_id, err);
        }
        restored_groups += 1;
        restored_tabs += step.tab_ids.len();
    }

    // Previously ungrouped tabs count once they no longer sit in a group.
    restored_tabs += plan
        .restore_ungrouped
        .iter()
        .filter(|id| !plan.is_currently_grouped(**id) || ungrouped.contains(*id))
        .count();

    focus_debug!(
        "Reverted {}: {} tabs in {} groups",
        snapshot.snapshot_id,
        restored_tabs,
        restored_groups
    );
    Ok(RevertOutcome {
        restored_tabs,
        restored_groups,
        skipped_tabs: plan.snapshot_tab_count.saturating_sub(restored_tabs),
    })
}

/// Ungroup in one call, then one call per tab if the batch is refused.
/// Returns the tabs that left their groups.
async fn ungroup_tabs(host: &dyn TabHost, tab_ids: &[TabId]) -> HashSet<TabId> {
    if tab_ids.is_empty() {
        return HashSet::new();
    }
    match host.ungroup(tab_ids).await {
        Ok(()) => return tab_ids.iter().copied().collect(),
        Err(err) => focus_warn!("Batch ungroup of {} tabs failed: {}", tab_ids.len(), err),
    }
    let mut ungrouped = HashSet::new();
    for &tab_id in tab_ids {
        match host.ungroup(&[tab_id]).await {
            Ok(()) => {
                ungrouped.insert(tab_id);
            }
            Err(err) => focus_warn!("Ungrouping tab {} failed: {}", tab_id, err),
        }
    }
    ungrouped
}
