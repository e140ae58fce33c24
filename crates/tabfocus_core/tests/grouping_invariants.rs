use std::sync::Once;

use pretty_assertions::assert_eq;
use tabfocus_core::{cluster_tabs, post_process, tokens, GroupSuggestion, Tab};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tabfocus_logging::initialize_for_tests);
}

fn tab(title: &str, domain: &str) -> Tab {
    Tab {
        chrome_tab_id: 0,
        window_id: 1,
        tab_index: 0,
        title: title.to_string(),
        domain: domain.to_string(),
        url: None,
        pinned: false,
        prior_group_id: None,
        page_context: None,
    }
}

fn assert_covers_exactly_once(groups: &[GroupSuggestion], tab_count: usize) {
    let mut seen: Vec<usize> = groups
        .iter()
        .flat_map(|group| group.tab_indices.iter().copied())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..tab_count).collect::<Vec<_>>());
}

fn mixed_tabs() -> Vec<Tab> {
    vec![
        tab("Rust async runtime internals", "tokio.rs"),
        tab("Rust async cancellation", "docs.rs"),
        tab("Kubernetes ingress controllers", "kubernetes.io"),
        tab("Kubernetes pods lifecycle", "kubernetes.io"),
        tab("Sourdough starter schedule", "bread.example.com"),
        tab("Python pandas dataframe", "pandas.pydata.org"),
        tab("Python pandas groupby", "pandas.pydata.org"),
        tab("Rust borrow checker", "rust-lang.org"),
        tab("Inbox", "mail.example.com"),
        tab("Weather forecast", "weather.com"),
        tab("Kubernetes helm charts", "helm.sh"),
    ]
}

#[test]
fn heuristic_then_guardrails_cover_every_tab() {
    init_logging();
    let tabs = mixed_tabs();
    let raw = cluster_tabs(&tabs);
    assert_covers_exactly_once(&raw, tabs.len());
    let guarded = post_process(&raw, &tabs);
    assert_covers_exactly_once(&guarded, tabs.len());
}

#[test]
fn guardrails_repair_messy_suggestions() {
    init_logging();
    let tabs = mixed_tabs();
    let messy = vec![
        GroupSuggestion::new("Misc", vec![0, 0, 1, 42]),
        GroupSuggestion::new("", vec![1, 2, 3]),
        GroupSuggestion::new("Everything", (0..tabs.len()).collect()).with_confidence(0.1),
    ];
    let guarded = post_process(&messy, &tabs);
    assert_covers_exactly_once(&guarded, tabs.len());
    for group in &guarded {
        assert!(!group.name.is_empty());
        assert!(group.name.chars().count() <= tabfocus_core::MAX_GROUP_NAME_CHARS);
    }
}

#[test]
fn no_tabs_means_no_groups() {
    init_logging();
    assert!(cluster_tabs(&[]).is_empty());
    assert!(post_process(&[GroupSuggestion::new("Stray", vec![0])], &[]).is_empty());
}

#[test]
fn three_identical_titles_form_one_heuristic_cluster() {
    init_logging();
    let tabs = vec![
        tab("Weekly planning board", "a.example.com"),
        tab("Weekly planning board", "b.example.org"),
        tab("Weekly planning board", "c.example.net"),
    ];
    let groups = cluster_tabs(&tabs);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].tab_indices, vec![0, 1, 2]);
}

#[test]
fn domain_heavy_low_confidence_group_is_split() {
    init_logging();
    let tabs = vec![
        tab("Rust async runtime", "medium.com"),
        tab("Rust async executors", "medium.com"),
        tab("Python pandas dataframe", "medium.com"),
        tab("Python pandas groupby", "medium.com"),
        tab("Sourdough bread recipe", "food.com"),
    ];
    let suggestion = GroupSuggestion::new("Reading", (0..5).collect()).with_confidence(0.5);

    let guarded = post_process(&[suggestion], &tabs);

    assert!(guarded.len() >= 2, "expected a split, got {guarded:?}");
    assert_covers_exactly_once(&guarded, tabs.len());
    assert_eq!(guarded[0].name, "Reading async");
    assert_eq!(guarded[0].tab_indices, vec![0, 1]);
    assert_eq!(guarded[1].name, "Reading pandas");
    assert_eq!(guarded[1].tab_indices, vec![2, 3]);
}

#[test]
fn similarity_is_symmetric_across_the_fixture() {
    init_logging();
    let tabs = mixed_tabs();
    for a in &tabs {
        for b in &tabs {
            assert_eq!(tokens::similarity(a, b), tokens::similarity(b, a));
        }
        assert_eq!(tokens::similarity(a, a), 1.0);
    }
}
