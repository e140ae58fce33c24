use std::collections::HashSet;

use crate::guardrails::MAX_GROUP_NAME_CHARS;
use crate::text::clean_label;
use crate::{PreviewGroup, Tab, TabId, WindowId};

/// One browser-level group to create. A logical preview group may expand
/// into several of these when tabs live in different windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedGroup {
    pub title: String,
    pub window_id: Option<WindowId>,
    pub tab_indices: Vec<usize>,
    pub tab_ids: Vec<TabId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPlan {
    pub groups: Vec<PlannedGroup>,
    pub tab_count: usize,
}

impl ApplyPlan {
    pub fn planned_tab_ids(&self) -> Vec<TabId> {
        self.groups
            .iter()
            .flat_map(|group| group.tab_ids.iter().copied())
            .collect()
    }

    pub fn planned_tabs(&self) -> usize {
        self.groups.iter().map(|group| group.tab_ids.len()).sum()
    }
}

/// Turn preview groups into concrete grouping steps.
///
/// A tab claimed by an earlier group is ignored by later ones. Unless
/// `allow_cross_window` is set, each group is partitioned by window in order
/// of first appearance.
pub fn plan_apply(tabs: &[Tab], groups: &[PreviewGroup], allow_cross_window: bool) -> ApplyPlan {
    let mut already_grouped: HashSet<usize> = HashSet::new();
    let mut planned = Vec::new();

    for group in groups {
        let indices: Vec<usize> = group
            .tab_indices
            .iter()
            .copied()
            .filter(|&tab_index| tab_index < tabs.len() && already_grouped.insert(tab_index))
            .collect();
        if indices.is_empty() {
            continue;
        }
        let title = clean_label(&group.name, MAX_GROUP_NAME_CHARS);

        if allow_cross_window {
            planned.push(planned_group(title, None, indices, tabs));
            continue;
        }

        let mut partitions: Vec<(WindowId, Vec<usize>)> = Vec::new();
        for tab_index in indices {
            let window_id = tabs[tab_index].window_id;
            match partitions.iter_mut().find(|(window, _)| *window == window_id) {
                Some((_, members)) => members.push(tab_index),
                None => partitions.push((window_id, vec![tab_index])),
            }
        }
        for (window_id, members) in partitions {
            planned.push(planned_group(title.clone(), Some(window_id), members, tabs));
        }
    }

    ApplyPlan {
        groups: planned,
        tab_count: tabs.len(),
    }
}

fn planned_group(
    title: String,
    window_id: Option<WindowId>,
    tab_indices: Vec<usize>,
    tabs: &[Tab],
) -> PlannedGroup {
    let tab_ids = tab_indices
        .iter()
        .map(|&tab_index| tabs[tab_index].chrome_tab_id)
        .collect();
    PlannedGroup {
        title,
        window_id,
        tab_indices,
        tab_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: TabId, window_id: WindowId) -> Tab {
        Tab {
            chrome_tab_id: id,
            window_id,
            tab_index: 0,
            title: format!("Tab {id}"),
            domain: "example.com".to_string(),
            url: None,
            pinned: false,
            prior_group_id: None,
            page_context: None,
        }
    }

    fn group(name: &str, indices: Vec<usize>) -> PreviewGroup {
        PreviewGroup {
            id: name.to_lowercase(),
            name: name.to_string(),
            tab_indices: indices,
            confidence: None,
            rationale: None,
            sample_titles: Vec::new(),
        }
    }

    #[test]
    fn contested_tabs_go_to_the_first_group() {
        let tabs = vec![tab(10, 1), tab(11, 1), tab(12, 1)];
        let plan = plan_apply(
            &tabs,
            &[group("A", vec![0, 1]), group("B", vec![1, 2, 2, 8])],
            true,
        );
        assert_eq!(plan.groups.len(), 2);
        assert_eq!(plan.groups[0].tab_ids, vec![10, 11]);
        assert_eq!(plan.groups[1].tab_ids, vec![12]);
        assert_eq!(plan.planned_tabs(), 3);
    }

    #[test]
    fn groups_split_per_window_unless_cross_window_allowed() {
        let tabs = vec![tab(1, 100), tab(2, 200), tab(3, 100)];
        let groups = [group("Mixed", vec![0, 1, 2])];

        let split = plan_apply(&tabs, &groups, false);
        assert_eq!(split.groups.len(), 2);
        assert_eq!(split.groups[0].window_id, Some(100));
        assert_eq!(split.groups[0].tab_ids, vec![1, 3]);
        assert_eq!(split.groups[1].window_id, Some(200));
        assert_eq!(split.groups[1].title, "Mixed");

        let joined = plan_apply(&tabs, &groups, true);
        assert_eq!(joined.groups.len(), 1);
        assert_eq!(joined.planned_tab_ids(), vec![1, 2, 3]);
    }
}
