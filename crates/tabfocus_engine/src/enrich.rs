//! Targeted page-context enrichment for tabs whose first-pass grouping looks
//! unreliable.

use tabfocus_core::text::clamp_chars;
use tabfocus_core::tokens::url_path_segments;
use tabfocus_core::{dominant_domain_ratio, is_generic_name, GroupSuggestion, PageContext, Tab, TabId};
use tabfocus_logging::focus_debug;

use crate::host::HostError;

pub const MAX_ENRICHED_TABS: usize = 25;
pub const AMBIGUOUS_GROUP_SIZE: usize = 12;
pub const AMBIGUOUS_DOMAIN_RATIO: f64 = 0.7;
pub const AMBIGUOUS_CONFIDENCE: f64 = 0.65;

const MAX_SITE_HINTS: usize = 6;
const MIN_HINT_CHARS: usize = 4;
const MAX_DESCRIPTION_CHARS: usize = 220;
const MAX_HEADING_CHARS: usize = 120;
const MAX_HEADINGS: usize = 4;
const MAX_SNIPPET_CHARS: usize = 360;

/// Raw text pulled out of a page by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtract {
    pub description: Option<String>,
    pub headings: Vec<String>,
    pub snippet: Option<String>,
}

#[async_trait::async_trait]
pub trait PageReader: Send + Sync {
    /// Whether the user granted access to read page content.
    async fn has_site_access(&self) -> bool;

    async fn read_page(&self, tab_id: TabId) -> Result<PageExtract, HostError>;
}

/// Reader for hosts that cannot script pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPageAccess;

#[async_trait::async_trait]
impl PageReader for NoPageAccess {
    async fn has_site_access(&self) -> bool {
        false
    }

    async fn read_page(&self, _tab_id: TabId) -> Result<PageExtract, HostError> {
        Err(HostError::new("read_page", "page access unavailable"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub tabs: Vec<Tab>,
    pub enriched: bool,
    pub hint: String,
}

/// Tabs belonging to groups that are large, domain-heavy, unsure or
/// generically named, in first-seen order and capped.
pub fn ambiguous_tab_indices(tabs: &[Tab], groups: &[GroupSuggestion]) -> Vec<usize> {
    let mut picked: Vec<usize> = Vec::new();
    for group in groups {
        let indices = &group.tab_indices;
        if indices.is_empty() {
            continue;
        }
        let ambiguous = indices.len() > AMBIGUOUS_GROUP_SIZE
            || dominant_domain_ratio(indices, tabs) >= AMBIGUOUS_DOMAIN_RATIO
            || group.confidence.is_some_and(|c| c < AMBIGUOUS_CONFIDENCE)
            || is_generic_name(&group.name);
        if !ambiguous {
            continue;
        }
        for &tab_index in indices {
            if !picked.contains(&tab_index) {
                picked.push(tab_index);
            }
        }
    }
    picked.truncate(MAX_ENRICHED_TABS);
    picked
}

/// Up to six distinctive words from the title and URL path.
pub fn site_hints(tab: &Tab) -> Vec<String> {
    let mut hints: Vec<String> = Vec::new();
    let lowered: String = tab
        .title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    let title_words = lowered
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_HINT_CHARS)
        .take(MAX_SITE_HINTS);
    let path_words = tab
        .url
        .as_deref()
        .map(url_path_segments)
        .unwrap_or_default()
        .into_iter()
        .take(MAX_SITE_HINTS);

    for word in title_words.map(str::to_string).chain(path_words) {
        if !hints.contains(&word) {
            hints.push(word);
        }
    }
    hints.truncate(MAX_SITE_HINTS);
    hints
}

fn squash(text: &str, max_chars: usize) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let clamped = clamp_chars(&joined, max_chars);
    (!clamped.is_empty()).then_some(clamped)
}

fn page_context(extract: PageExtract, hints: Vec<String>) -> PageContext {
    PageContext {
        description: extract
            .description
            .as_deref()
            .and_then(|text| squash(text, MAX_DESCRIPTION_CHARS)),
        headings: extract
            .headings
            .iter()
            .filter_map(|heading| squash(heading, MAX_HEADING_CHARS))
            .take(MAX_HEADINGS)
            .collect(),
        snippet: extract
            .snippet
            .as_deref()
            .and_then(|text| squash(text, MAX_SNIPPET_CHARS)),
        site_hints: hints,
    }
}

/// Attach page context to ambiguous tabs. Returns a new tab list; the input
/// is left untouched.
pub async fn enrich_tabs(
    tabs: &[Tab],
    groups: &[GroupSuggestion],
    reader: &dyn PageReader,
) -> Enrichment {
    let unchanged = |hint: &str| Enrichment {
        tabs: tabs.to_vec(),
        enriched: false,
        hint: hint.to_string(),
    };
    if tabs.is_empty() {
        return unchanged("No tabs to enrich.");
    }
    let targets = ambiguous_tab_indices(tabs, groups);
    if targets.is_empty() {
        return unchanged("No ambiguous tabs detected.");
    }
    if !reader.has_site_access().await {
        return unchanged("Site permission denied. Using title and URL only.");
    }

    let mut next = tabs.to_vec();
    let mut enriched_count = 0usize;
    for tab_index in targets {
        let Some(tab) = next.get_mut(tab_index) else {
            continue;
        };
        let hints = site_hints(tab);
        match reader.read_page(tab.chrome_tab_id).await {
            Ok(extract) => {
                tab.page_context = Some(page_context(extract, hints));
                enriched_count += 1;
            }
            Err(err) => {
                focus_debug!("Page context for tab {} unavailable: {}", tab.chrome_tab_id, err);
                tab.page_context = Some(PageContext {
                    site_hints: hints,
                    ..PageContext::default()
                });
            }
        }
    }

    let hint = if enriched_count > 0 {
        format!("Enriched {enriched_count} tabs with page context.")
    } else {
        "No readable page context extracted. Used title/URL metadata.".to_string()
    };
    Enrichment {
        tabs: next,
        enriched: enriched_count > 0,
        hint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: TabId, title: &str, domain: &str, url: Option<&str>) -> Tab {
        Tab {
            chrome_tab_id: id,
            window_id: 1,
            tab_index: 0,
            title: title.to_string(),
            domain: domain.to_string(),
            url: url.map(str::to_string),
            pinned: false,
            prior_group_id: None,
            page_context: None,
        }
    }

    struct FixedReader;

    #[async_trait::async_trait]
    impl PageReader for FixedReader {
        async fn has_site_access(&self) -> bool {
            true
        }

        async fn read_page(&self, tab_id: TabId) -> Result<PageExtract, HostError> {
            if tab_id == 2 {
                return Err(HostError::new("read_page", "blocked"));
            }
            Ok(PageExtract {
                description: Some("  Lots\n of   space ".to_string()),
                headings: (0..6).map(|i| format!("Heading {i}")).collect(),
                snippet: Some(String::new()),
            })
        }
    }

    #[test]
    fn confident_specific_groups_are_not_ambiguous() {
        let tabs = vec![tab(1, "A", "a.com", None), tab(2, "B", "b.com", None)];
        let groups = vec![GroupSuggestion::new("Research", vec![0, 1]).with_confidence(0.9)];
        assert!(ambiguous_tab_indices(&tabs, &groups).is_empty());

        let generic = vec![GroupSuggestion::new("Misc", vec![1, 0])];
        assert_eq!(ambiguous_tab_indices(&tabs, &generic), vec![1, 0]);
    }

    #[test]
    fn ambiguous_tabs_are_capped() {
        let tabs: Vec<Tab> = (0..40).map(|i| tab(i, "T", "same.com", None)).collect();
        let groups = vec![GroupSuggestion::new("Everything", (0..40).collect())];
        assert_eq!(ambiguous_tab_indices(&tabs, &groups).len(), MAX_ENRICHED_TABS);
    }

    #[test]
    fn hints_mix_title_and_path_words() {
        let t = tab(
            1,
            "Rust: async/await explained",
            "x.com",
            Some("https://x.com/learn/async-rust/ch01"),
        );
        assert_eq!(site_hints(&t), vec!["rust", "async", "await", "explained", "learn", "async-rust"]);
    }

    #[tokio::test]
    async fn permission_gate_leaves_tabs_unchanged() {
        let tabs = vec![tab(1, "A", "a.com", None)];
        let groups = vec![GroupSuggestion::new("Misc", vec![0])];
        let result = enrich_tabs(&tabs, &groups, &NoPageAccess).await;
        assert!(!result.enriched);
        assert_eq!(result.tabs, tabs);
        assert!(result.hint.contains("permission"));
    }

    #[tokio::test]
    async fn failed_reads_still_get_site_hints() {
        let tabs = vec![
            tab(1, "Alpha release notes", "a.com", None),
            tab(2, "Beta roadmap", "a.com", None),
        ];
        let groups = vec![GroupSuggestion::new("Stuff", vec![0, 1])];
        let result = enrich_tabs(&tabs, &groups, &FixedReader).await;

        assert!(result.enriched);
        assert_eq!(result.hint, "Enriched 1 tabs with page context.");
        let first = result.tabs[0].page_context.as_ref().unwrap();
        assert_eq!(first.description.as_deref(), Some("Lots of space"));
        assert_eq!(first.headings.len(), MAX_HEADINGS);
        assert_eq!(first.snippet, None);
        let second = result.tabs[1].page_context.as_ref().unwrap();
        assert_eq!(second.description, None);
        assert_eq!(second.site_hints, vec!["beta", "roadmap"]);
        assert!(tabs[0].page_context.is_none());
    }
}
