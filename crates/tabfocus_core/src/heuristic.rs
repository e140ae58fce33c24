//! Deterministic local clustering used whenever the classifier is unavailable.

use crate::text::{domain_label, title_case};
use crate::tokens::TokenIndex;
use crate::{GroupSuggestion, Tab};

/// Minimum score for a tab to join an existing cluster on the first pass.
pub const JOIN_THRESHOLD: f64 = 0.26;
/// Stricter score for folding a leftover singleton into a larger cluster.
pub const SINGLETON_REATTACH_THRESHOLD: f64 = 0.34;
pub const DOMAIN_BONUS: f64 = 0.06;
/// Members sampled from the front of a cluster when scoring a candidate.
pub const SAMPLED_MEMBERS: usize = 4;

#[derive(Debug)]
struct Cluster {
    members: Vec<usize>,
    primary_domain: String,
    absorbed: bool,
}

impl Cluster {
    fn founded_by(index: usize, tab: &Tab) -> Self {
        Self {
            members: vec![index],
            primary_domain: tab.domain.clone(),
            absorbed: false,
        }
    }

    fn score(&self, candidate: usize, tabs: &[Tab], index: &TokenIndex) -> f64 {
        let sampled = &self.members[..self.members.len().min(SAMPLED_MEMBERS)];
        if sampled.is_empty() {
            return 0.0;
        }
        let total: f64 = sampled
            .iter()
            .map(|&member| index.similarity(candidate, member))
            .sum();
        let mut score = total / sampled.len() as f64;
        if tabs[candidate].domain == self.primary_domain {
            score += DOMAIN_BONUS;
        }
        score
    }
}

/// Group `tabs` without any remote help.
///
/// Every tab lands in exactly one suggestion. Output is ordered by descending
/// size; equal sizes keep formation order.
pub fn cluster_tabs(tabs: &[Tab]) -> Vec<GroupSuggestion> {
    let index = TokenIndex::build(tabs);
    let mut clusters: Vec<Cluster> = Vec::new();

    for (tab_index, tab) in tabs.iter().enumerate() {
        let best = best_cluster(&clusters, tab_index, tabs, &index, |_| true);
        match best {
            Some((target, score)) if score >= JOIN_THRESHOLD => {
                clusters[target].members.push(tab_index);
            }
            _ => clusters.push(Cluster::founded_by(tab_index, tab)),
        }
    }

    reattach_singletons(&mut clusters, tabs, &index);

    let mut survivors: Vec<Cluster> = clusters.into_iter().filter(|c| !c.absorbed).collect();
    survivors.sort_by_key(|cluster| std::cmp::Reverse(cluster.members.len()));

    survivors
        .into_iter()
        .map(|cluster| describe(cluster, &index))
        .collect()
}

fn best_cluster(
    clusters: &[Cluster],
    candidate: usize,
    tabs: &[Tab],
    index: &TokenIndex,
    eligible: impl Fn(&Cluster) -> bool,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (position, cluster) in clusters.iter().enumerate() {
        if cluster.absorbed || !eligible(cluster) {
            continue;
        }
        let score = cluster.score(candidate, tabs, index);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((position, score));
        }
    }
    best
}

fn reattach_singletons(clusters: &mut [Cluster], tabs: &[Tab], index: &TokenIndex) {
    for position in 0..clusters.len() {
        if clusters[position].members.len() != 1 {
            continue;
        }
        let candidate = clusters[position].members[0];
        let best = best_cluster(clusters, candidate, tabs, index, |c| c.members.len() >= 2);
        if let Some((target, score)) = best {
            if score >= SINGLETON_REATTACH_THRESHOLD {
                clusters[target].members.push(candidate);
                clusters[position].absorbed = true;
            }
        }
    }
}

fn describe(cluster: Cluster, index: &TokenIndex) -> GroupSuggestion {
    let size = cluster.members.len();
    match index.tally(&cluster.members).top_shared() {
        Some(token) => GroupSuggestion::new(format!("{} Focus", title_case(&token)), cluster.members)
            .with_rationale(format!("Shared topic \"{token}\" across {size} tabs")),
        None => {
            let rationale = if size == 1 {
                format!("Single tab from {}", cluster.primary_domain)
            } else {
                format!("{size} tabs from {}", cluster.primary_domain)
            };
            GroupSuggestion::new(domain_label(&cluster.primary_domain), cluster.members)
                .with_rationale(rationale)
        }
    }
}
