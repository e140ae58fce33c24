use tabfocus_core::{ApplyPlan, ApplySummary, GroupColor};
use tabfocus_logging::{focus_debug, focus_warn};

use crate::host::TabHost;

/// Create the planned groups one after another.
///
/// A group the host refuses to create leaves its tabs skipped. A group that
/// was created but could not be titled still counts as created.
pub async fn execute_apply(host: &dyn TabHost, plan: &ApplyPlan) -> ApplySummary {
    let mut grouped_tabs = 0;
    let mut groups_created = 0;

    for planned in &plan.groups {
        let group_id = match host.group(&planned.tab_ids, planned.window_id).await {
            Ok(group_id) => group_id,
            Err(err) => {
                focus_warn!("Could not create group '{}': {}", planned.title, err);
                continue;
            }
        };
        let color = GroupColor::for_creation_index(groups_created);
        if let Err(err) = host.update_group(group_id, &planned.title, color).await {
            focus_warn!("Could not title group {}: {}", group_id, err);
        }
        focus_debug!(
            "Created group {} '{}' ({}) with {} tabs",
            group_id,
            planned.title,
            color.as_str(),
            planned.tab_ids.len()
        );
        groups_created += 1;
        grouped_tabs += planned.tab_ids.len();
    }

    ApplySummary {
        grouped_tabs,
        groups_created,
        skipped_tabs: plan.tab_count.saturating_sub(grouped_tabs),
    }
}
