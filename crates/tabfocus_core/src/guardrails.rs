//! Quality guardrails applied to every grouping proposal before it reaches a
//! preview: coverage, naming, weak-group splitting and tiny-group merging.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::text::{clamp_chars, title_case};
use crate::tokens::TokenIndex;
use crate::{GroupSuggestion, Tab};

pub const MAX_GROUP_NAME_CHARS: usize = 40;
pub const MAX_GROUP_SIZE: usize = 9;
pub const MIN_COHESION: f64 = 0.16;
pub const COHESION_MIN_SIZE: usize = 3;
pub const DOMAIN_HEAVY_RATIO: f64 = 0.65;
pub const DOMAIN_HEAVY_MIN_SIZE: usize = 5;
pub const MIN_CONFIDENCE: f64 = 0.62;
pub const SPLIT_CANDIDATE_TOKENS: usize = 10;
pub const MERGE_THRESHOLD: f64 = 0.22;

const UNGROUPED_NAME: &str = "Ungrouped Focus";
const FALLBACK_NAME: &str = "Focused Group";

static GENERIC_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(group|tabs|misc|other|random|stuff)\b").expect("generic name pattern")
});

pub fn is_generic_name(name: &str) -> bool {
    GENERIC_NAME.is_match(name)
}

/// Why a group was flagged for splitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Weakness {
    pub too_large: bool,
    pub low_cohesion: bool,
    pub domain_heavy: bool,
    pub low_confidence: bool,
}

impl Weakness {
    pub fn any(&self) -> bool {
        self.too_large || self.low_cohesion || self.domain_heavy || self.low_confidence
    }
}

pub fn assess(group: &GroupSuggestion, tabs: &[Tab], index: &TokenIndex) -> Weakness {
    let size = group.tab_indices.len();
    Weakness {
        too_large: size > MAX_GROUP_SIZE,
        low_cohesion: size >= COHESION_MIN_SIZE && index.cohesion(&group.tab_indices) < MIN_COHESION,
        domain_heavy: size >= DOMAIN_HEAVY_MIN_SIZE
            && dominant_domain_ratio(&group.tab_indices, tabs) >= DOMAIN_HEAVY_RATIO,
        low_confidence: group.confidence.is_some_and(|c| c < MIN_CONFIDENCE),
    }
}

/// Repair raw suggestions so that every index in `0..tabs.len()` appears in
/// exactly one returned group.
pub fn post_process(groups: &[GroupSuggestion], tabs: &[Tab]) -> Vec<GroupSuggestion> {
    let index = TokenIndex::build(tabs);

    let covered: Vec<GroupSuggestion> = enforce_coverage(groups, tabs.len())
        .into_iter()
        .map(|mut group| {
            group.name = preferred_name(&group, &index);
            group
        })
        .collect();
    let split = split_weak_groups(covered, tabs, &index);
    let merged = merge_tiny_groups(split, &index);

    merged
        .into_iter()
        .enumerate()
        .map(|(position, mut group)| {
            let name = clamp_chars(group.name.trim(), MAX_GROUP_NAME_CHARS);
            group.name = if name.is_empty() {
                format!("Group {}", position + 1)
            } else {
                name
            };
            group.tab_indices = dedupe(&group.tab_indices);
            group
        })
        .collect()
}

fn enforce_coverage(groups: &[GroupSuggestion], tab_count: usize) -> Vec<GroupSuggestion> {
    let mut used = vec![false; tab_count];
    let mut normalized = Vec::with_capacity(groups.len());

    for group in groups {
        let mut unique = Vec::new();
        for &tab_index in &group.tab_indices {
            if tab_index >= tab_count || used[tab_index] {
                continue;
            }
            used[tab_index] = true;
            unique.push(tab_index);
        }
        if !unique.is_empty() {
            normalized.push(GroupSuggestion {
                tab_indices: unique,
                ..group.clone()
            });
        }
    }

    for (tab_index, _) in used.iter().enumerate().filter(|(_, taken)| !**taken) {
        normalized.push(GroupSuggestion::new(UNGROUPED_NAME, vec![tab_index]));
    }

    normalized
}

fn preferred_name(group: &GroupSuggestion, index: &TokenIndex) -> String {
    if !is_generic_name(&group.name) {
        return group.name.clone();
    }
    match index.tally(&group.tab_indices).top() {
        Some((token, _)) => format!("{} Focus", title_case(&token)),
        None => FALLBACK_NAME.to_string(),
    }
}

/// Share of `indices` held by the most common domain; 0 for an empty list.
pub fn dominant_domain_ratio(indices: &[usize], tabs: &[Tab]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &tab_index in indices {
        let domain = tabs.get(tab_index).map_or("unknown", |tab| tab.domain.as_str());
        *counts.entry(domain).or_default() += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    max as f64 / indices.len() as f64
}

/// Bucket members by their strongest recurring token, falling back to domain.
fn bucket_by_dominant_token(
    indices: &[usize],
    tabs: &[Tab],
    index: &TokenIndex,
) -> Vec<(String, Vec<usize>)> {
    let tally = index.tally(indices);
    let candidates: Vec<(String, usize)> = tally
        .ranked()
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .take(SPLIT_CANDIDATE_TOKENS)
        .collect();

    let mut buckets: Vec<(String, Vec<usize>)> = Vec::new();
    for &tab_index in indices {
        let Some(tab) = tabs.get(tab_index) else {
            continue;
        };
        let tokens = index.tokens(tab_index);
        let mut best: Option<(&str, usize)> = None;
        for (token, count) in &candidates {
            if !tokens.contains(token) {
                continue;
            }
            if best.map_or(true, |(_, best_count)| *count > best_count) {
                best = Some((token.as_str(), *count));
            }
        }
        let key = match best {
            Some((token, _)) => token.to_string(),
            None if !tab.domain.is_empty() => tab.domain.clone(),
            None => "misc".to_string(),
        };
        match buckets.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(tab_index),
            None => buckets.push((key, vec![tab_index])),
        }
    }
    buckets
}

fn split_weak_groups(
    groups: Vec<GroupSuggestion>,
    tabs: &[Tab],
    index: &TokenIndex,
) -> Vec<GroupSuggestion> {
    let mut next = Vec::with_capacity(groups.len());
    for group in groups {
        if !assess(&group, tabs, index).any() {
            next.push(group);
            continue;
        }

        let buckets = bucket_by_dominant_token(&group.tab_indices, tabs, index);
        if buckets.len() <= 1 {
            next.push(group);
            continue;
        }

        let base_name = preferred_name(&group, index);
        for (token, members) in buckets {
            next.push(GroupSuggestion {
                name: clamp_chars(&format!("{base_name} {token}"), MAX_GROUP_NAME_CHARS),
                tab_indices: members,
                ..group.clone()
            });
        }
    }
    next
}

fn merge_tiny_groups(groups: Vec<GroupSuggestion>, index: &TokenIndex) -> Vec<GroupSuggestion> {
    let (mut stable, tiny): (Vec<_>, Vec<_>) =
        groups.into_iter().partition(|group| group.tab_indices.len() > 1);

    for candidate in tiny {
        let Some(&sole) = candidate.tab_indices.first() else {
            continue;
        };
        let mut best: Option<(usize, f64)> = None;
        for (position, target) in stable.iter().enumerate() {
            if target.tab_indices.len() < 2 {
                continue;
            }
            let score = index.similarity(sole, target.tab_indices[0]);
            if score > best.map_or(0.0, |(_, best_score)| best_score) {
                best = Some((position, score));
            }
        }
        match best {
            Some((position, score)) if score >= MERGE_THRESHOLD => {
                stable[position].tab_indices.extend(candidate.tab_indices);
            }
            _ => stable.push(candidate),
        }
    }
    stable
}

fn dedupe(indices: &[usize]) -> Vec<usize> {
    let mut seen = std::collections::HashSet::new();
    indices
        .iter()
        .copied()
        .filter(|tab_index| seen.insert(*tab_index))
        .collect()
}
