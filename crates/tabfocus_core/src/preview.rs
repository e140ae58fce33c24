//! Preview drafts: building them from pipeline output, re-validating edited
//! drafts, and the edit operations a front end may perform.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::guardrails::MAX_GROUP_NAME_CHARS;
use crate::text::clean_label;
use crate::{AiRunMeta, GroupSuggestion, PreviewDraft, PreviewGroup, Tab};

pub const MAX_RATIONALE_CHARS: usize = 160;
pub const MAX_SAMPLE_TITLES: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    pub grouped_tabs: usize,
    pub group_count: usize,
    pub skipped_tabs: usize,
}

/// Everything the pipeline knows about a run besides the groups themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutcome {
    pub tabs: Vec<Tab>,
    pub groups: Vec<GroupSuggestion>,
    pub used_fallback: bool,
    pub enriched_context_used: bool,
    pub hint: String,
    pub ai_meta: Option<AiRunMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveTarget {
    Group(String),
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftEditError {
    #[error("unknown group id {0}")]
    UnknownGroup(String),
    #[error("tab index {index} out of range for {tab_count} tabs")]
    TabOutOfRange { index: usize, tab_count: usize },
    #[error("group name must not be empty")]
    EmptyName,
}

/// Build a draft from guarded pipeline output.
///
/// Returns `None` when there are no tabs; an empty draft cannot be applied.
pub fn build_preview_draft(
    draft_id: impl Into<String>,
    created_at: i64,
    outcome: PipelineOutcome,
) -> Option<PreviewDraft> {
    let groups = outcome
        .groups
        .into_iter()
        .enumerate()
        .map(|(position, group)| PreviewGroup {
            id: format!("group_{}", position + 1),
            name: group.name,
            tab_indices: group.tab_indices,
            confidence: group.confidence,
            rationale: group.rationale,
            sample_titles: Vec::new(),
        })
        .collect();

    let draft = PreviewDraft {
        draft_id: draft_id.into(),
        created_at,
        tabs: outcome.tabs,
        groups,
        excluded_tab_indices: Vec::new(),
        used_fallback: outcome.used_fallback,
        enriched_context_used: outcome.enriched_context_used,
        hint: outcome.hint,
        ai_meta: outcome.ai_meta,
    };
    sanitize_preview_draft(&draft)
}

/// Re-validate a draft, typically one edited by the user.
///
/// Out-of-range indices are dropped, the first occurrence of a tab wins,
/// names and rationales are clamped, missing or duplicate ids are
/// regenerated and every unassigned tab becomes excluded. Sanitizing a
/// sanitized draft returns it unchanged.
pub fn sanitize_preview_draft(draft: &PreviewDraft) -> Option<PreviewDraft> {
    let tab_count = draft.tabs.len();
    if tab_count == 0 {
        return None;
    }

    let mut used = vec![false; tab_count];
    let mut taken_ids: HashSet<String> = HashSet::new();
    let mut groups = Vec::with_capacity(draft.groups.len());

    for (position, group) in draft.groups.iter().enumerate() {
        let mut indices = Vec::new();
        for &tab_index in &group.tab_indices {
            if tab_index < tab_count && !used[tab_index] {
                used[tab_index] = true;
                indices.push(tab_index);
            }
        }
        if indices.is_empty() {
            continue;
        }

        let id = stable_id(group.id.trim(), position, &taken_ids);
        taken_ids.insert(id.clone());

        let name = match clean_label(&group.name, MAX_GROUP_NAME_CHARS) {
            name if name.is_empty() => format!("Group {}", groups.len() + 1),
            name => name,
        };
        let rationale = group
            .rationale
            .as_deref()
            .map(|text| clean_label(text, MAX_RATIONALE_CHARS))
            .filter(|text| !text.is_empty());
        let confidence = group
            .confidence
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 1.0));
        let sample_titles = sample_titles(&draft.tabs, &indices);

        groups.push(PreviewGroup {
            id,
            name,
            tab_indices: indices,
            confidence,
            rationale,
            sample_titles,
        });
    }

    let mut excluded = Vec::new();
    for &tab_index in &draft.excluded_tab_indices {
        if tab_index < tab_count && !used[tab_index] {
            used[tab_index] = true;
            excluded.push(tab_index);
        }
    }
    excluded.extend((0..tab_count).filter(|&tab_index| !used[tab_index]));
    excluded.sort_unstable();

    Some(PreviewDraft {
        groups,
        excluded_tab_indices: excluded,
        ..draft.clone()
    })
}

pub fn summarize_preview(draft: &PreviewDraft) -> PreviewSummary {
    PreviewSummary {
        grouped_tabs: draft.groups.iter().map(|g| g.tab_indices.len()).sum(),
        group_count: draft.groups.len(),
        skipped_tabs: draft.excluded_tab_indices.len(),
    }
}

fn stable_id(candidate: &str, position: usize, taken: &HashSet<String>) -> String {
    if !candidate.is_empty() && !taken.contains(candidate) {
        return candidate.to_string();
    }
    let mut n = position + 1;
    loop {
        let id = format!("group_{n}");
        if !taken.contains(&id) {
            return id;
        }
        n += 1;
    }
}

fn sample_titles(tabs: &[Tab], indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .filter_map(|&tab_index| tabs.get(tab_index))
        .map(|tab| tab.title.clone())
        .filter(|title| !title.is_empty())
        .take(MAX_SAMPLE_TITLES)
        .collect()
}

impl PreviewDraft {
    pub fn summary(&self) -> PreviewSummary {
        summarize_preview(self)
    }

    pub fn group(&self, id: &str) -> Option<&PreviewGroup> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn rename_group(&mut self, id: &str, name: &str) -> Result<(), DraftEditError> {
        let name = clean_label(name, MAX_GROUP_NAME_CHARS);
        if name.is_empty() {
            return Err(DraftEditError::EmptyName);
        }
        let group = self
            .groups
            .iter_mut()
            .find(|group| group.id == id)
            .ok_or_else(|| DraftEditError::UnknownGroup(id.to_string()))?;
        group.name = name;
        Ok(())
    }

    /// Move one tab into another group or into the excluded set. A group left
    /// without tabs is removed.
    pub fn move_tab(&mut self, tab_index: usize, target: MoveTarget) -> Result<(), DraftEditError> {
        let tab_count = self.tabs.len();
        if tab_index >= tab_count {
            return Err(DraftEditError::TabOutOfRange {
                index: tab_index,
                tab_count,
            });
        }
        if let MoveTarget::Group(id) = &target {
            if self.group(id).is_none() {
                return Err(DraftEditError::UnknownGroup(id.clone()));
            }
        }

        for group in &mut self.groups {
            group.tab_indices.retain(|&member| member != tab_index);
        }
        self.excluded_tab_indices.retain(|&member| member != tab_index);

        match target {
            MoveTarget::Group(id) => {
                if let Some(group) = self.groups.iter_mut().find(|group| group.id == id) {
                    group.tab_indices.push(tab_index);
                }
            }
            MoveTarget::Excluded => {
                self.excluded_tab_indices.push(tab_index);
                self.excluded_tab_indices.sort_unstable();
            }
        }

        self.groups.retain(|group| !group.tab_indices.is_empty());
        self.refresh_sample_titles();
        Ok(())
    }

    /// Remove a group; its tabs become excluded.
    pub fn delete_group(&mut self, id: &str) -> Result<(), DraftEditError> {
        let position = self
            .groups
            .iter()
            .position(|group| group.id == id)
            .ok_or_else(|| DraftEditError::UnknownGroup(id.to_string()))?;
        let removed = self.groups.remove(position);
        self.excluded_tab_indices.extend(removed.tab_indices);
        self.excluded_tab_indices.sort_unstable();
        self.excluded_tab_indices.dedup();
        Ok(())
    }

    fn refresh_sample_titles(&mut self) {
        for group in &mut self.groups {
            group.sample_titles = sample_titles(&self.tabs, &group.tab_indices);
        }
    }
}
