use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

pub type TabId = i64;
pub type WindowId = i64;
pub type GroupId = i64;

/// Raw tab record as reported by the browser host, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostTab {
    pub id: TabId,
    pub window_id: WindowId,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub group_id: Option<GroupId>,
}

/// Title and color of a live browser tab group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub title: String,
    #[serde(default)]
    pub color: Option<GroupColor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub site_hints: Vec<String>,
}

/// One open tab at collection time. Pipeline stages never mutate a tab in
/// place; they produce a new working list instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub chrome_tab_id: TabId,
    pub window_id: WindowId,
    pub tab_index: u32,
    pub title: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_context: Option<PageContext>,
}

/// Raw grouping proposal from the classifier or the heuristic engine.
/// `tab_indices` are positions in the current tab list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSuggestion {
    pub name: String,
    pub tab_indices: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl GroupSuggestion {
    pub fn new(name: impl Into<String>, tab_indices: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            tab_indices,
            confidence: None,
            rationale: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_indices")]
    pub tab_indices: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default)]
    pub sample_titles: Vec<String>,
}

/// Which models served a preview run and why the AI path may have failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRunMeta {
    pub primary_model: String,
    pub fallback_model: String,
    #[serde(default)]
    pub used_fallback_model: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_error_code: Option<String>,
}

/// Editable, not-yet-committed grouping proposal.
///
/// Every index in `0..tabs.len()` belongs to exactly one group or to
/// `excluded_tab_indices`. Use [`crate::sanitize_preview_draft`] to restore
/// that invariant on drafts that come back from an editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewDraft {
    #[serde(default)]
    pub draft_id: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    #[serde(default)]
    pub groups: Vec<PreviewGroup>,
    #[serde(default, deserialize_with = "lenient_indices")]
    pub excluded_tab_indices: Vec<usize>,
    #[serde(default)]
    pub used_fallback: bool,
    #[serde(default)]
    pub enriched_context_used: bool,
    #[serde(default)]
    pub hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_meta: Option<AiRunMeta>,
}

/// Tab index lists from hand-edited drafts: anything that is not a
/// non-negative integer is skipped instead of failing the whole draft.
/// Range and duplicate checks are left to draft sanitizing.
fn lenient_indices<'de, D>(deserializer: D) -> Result<Vec<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Indices;

    impl<'de> Visitor<'de> for Indices {
        type Value = Vec<usize>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a list of tab indices")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut indices = Vec::new();
            while let Some(entry) = seq.next_element::<MaybeIndex>()? {
                indices.extend(entry.0);
            }
            Ok(indices)
        }
    }

    deserializer.deserialize_any(Indices)
}

struct MaybeIndex(Option<usize>);

impl<'de> Deserialize<'de> for MaybeIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Entry;

        impl<'de> Visitor<'de> for Entry {
            type Value = MaybeIndex;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("any value")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MaybeIndex, E> {
                Ok(MaybeIndex(usize::try_from(v).ok()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MaybeIndex, E> {
                Ok(MaybeIndex(usize::try_from(v).ok()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<MaybeIndex, E> {
                let whole = v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64;
                Ok(MaybeIndex(whole.then_some(v as usize)))
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<MaybeIndex, E> {
                Ok(MaybeIndex(None))
            }

            fn visit_str<E: de::Error>(self, _: &str) -> Result<MaybeIndex, E> {
                Ok(MaybeIndex(None))
            }

            fn visit_unit<E: de::Error>(self) -> Result<MaybeIndex, E> {
                Ok(MaybeIndex(None))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<MaybeIndex, A::Error> {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(MaybeIndex(None))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<MaybeIndex, A::Error> {
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(MaybeIndex(None))
            }
        }

        deserializer.deserialize_any(Entry)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySummary {
    pub grouped_tabs: usize,
    pub groups_created: usize,
    pub skipped_tabs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

/// Round-robin order used for newly created groups.
pub const GROUP_COLOR_PALETTE: [GroupColor; 9] = [
    GroupColor::Orange,
    GroupColor::Blue,
    GroupColor::Green,
    GroupColor::Yellow,
    GroupColor::Purple,
    GroupColor::Pink,
    GroupColor::Cyan,
    GroupColor::Grey,
    GroupColor::Red,
];

impl GroupColor {
    /// Color for the `n`-th group created in one apply run.
    pub fn for_creation_index(n: usize) -> Self {
        GROUP_COLOR_PALETTE[n % GROUP_COLOR_PALETTE.len()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupColor::Grey => "grey",
            GroupColor::Blue => "blue",
            GroupColor::Red => "red",
            GroupColor::Yellow => "yellow",
            GroupColor::Green => "green",
            GroupColor::Pink => "pink",
            GroupColor::Purple => "purple",
            GroupColor::Cyan => "cyan",
            GroupColor::Orange => "orange",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTab {
    pub chrome_tab_id: TabId,
    pub prior_group_id: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotGroup {
    pub old_group_id: Option<GroupId>,
    pub title: String,
    #[serde(default)]
    pub color: Option<GroupColor>,
    pub tab_ids: Vec<TabId>,
}

/// Grouping state captured right before an apply overwrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub snapshot_id: String,
    pub created_at: i64,
    pub tabs: Vec<SnapshotTab>,
    pub prior_groups: Vec<SnapshotGroup>,
    #[serde(default)]
    pub summary: ApplySummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertHistoryEntry {
    pub snapshot_id: String,
    pub created_at: i64,
    pub grouped_tabs: usize,
    pub groups_created: usize,
}

impl From<&RunSnapshot> for RevertHistoryEntry {
    fn from(snapshot: &RunSnapshot) -> Self {
        Self {
            snapshot_id: snapshot.snapshot_id.clone(),
            created_at: snapshot.created_at,
            grouped_tabs: snapshot.summary.grouped_tabs,
            groups_created: snapshot.summary.groups_created,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveTab {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_tab_id: Option<TabId>,
    #[serde(default = "untitled_tab")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "unknown_domain")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,
    #[serde(default)]
    pub tab_index: u32,
}

fn untitled_tab() -> String {
    crate::UNTITLED_TAB.to_string()
}

fn unknown_domain() -> String {
    crate::UNKNOWN_DOMAIN.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub archive_id: String,
    pub created_at: i64,
    pub reason: String,
    pub tabs: Vec<ArchiveTab>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoToken {
    pub token_id: String,
    pub archive_id: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRunSummary {
    pub completed_at: i64,
    pub draft_id: String,
    pub snapshot_id: String,
    pub summary: ApplySummary,
    #[serde(default)]
    pub used_fallback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn edited_draft_indices_skip_non_indices() {
        let draft: PreviewDraft = serde_json::from_value(json!({
            "groups": [{ "name": "Docs", "tabIndices": [-1, 0, 1.0, 2.5, "3", null, [4], 99] }],
            "excludedTabIndices": null
        }))
        .unwrap();
        assert_eq!(draft.groups[0].tab_indices, vec![0, 1, 99]);
        assert_eq!(draft.groups[0].id, "");
        assert!(draft.tabs.is_empty());
        assert!(draft.excluded_tab_indices.is_empty());
    }
}
