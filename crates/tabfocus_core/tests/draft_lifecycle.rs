use std::sync::Once;

use pretty_assertions::assert_eq;
use tabfocus_core::{
    build_preview_draft, plan_apply, post_process, sanitize_preview_draft, GroupSuggestion,
    MoveTarget, PipelineOutcome, PreviewDraft, PreviewGroup, Tab, UndoSlot, UNDO_TTL_MS,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tabfocus_logging::initialize_for_tests);
}

fn tab(id: i64, window_id: i64, title: &str) -> Tab {
    Tab {
        chrome_tab_id: id,
        window_id,
        tab_index: id as u32,
        title: title.to_string(),
        domain: "example.com".to_string(),
        url: None,
        pinned: false,
        prior_group_id: None,
        page_context: None,
    }
}

fn fixture_tabs() -> Vec<Tab> {
    vec![
        tab(10, 1, "Rust async runtime"),
        tab(11, 2, "Rust async streams"),
        tab(12, 1, "Garden planting calendar"),
        tab(13, 1, "Garden soil testing"),
        tab(14, 2, "Quarterly budget sheet"),
    ]
}

fn fixture_draft() -> PreviewDraft {
    let tabs = fixture_tabs();
    let groups = post_process(
        &[
            GroupSuggestion::new("Rust Async", vec![0, 1]).with_confidence(0.9),
            GroupSuggestion::new("Gardening", vec![2, 3]).with_confidence(0.8),
        ],
        &tabs,
    );
    build_preview_draft(
        "draft_test",
        1_700_000_000_000,
        PipelineOutcome {
            tabs,
            groups,
            ..PipelineOutcome::default()
        },
    )
    .expect("non-empty draft")
}

fn assert_partition(draft: &PreviewDraft) {
    let mut seen: Vec<usize> = draft
        .groups
        .iter()
        .flat_map(|group| group.tab_indices.iter().copied())
        .chain(draft.excluded_tab_indices.iter().copied())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..draft.tabs.len()).collect::<Vec<_>>());
}

#[test]
fn edits_preserve_the_partition_and_sanitize_is_idempotent() {
    init_logging();
    let mut draft = fixture_draft();
    assert_partition(&draft);

    let garden_id = draft.groups[1].id.clone();
    draft.move_tab(4, MoveTarget::Group(garden_id)).unwrap();
    assert_partition(&draft);
    draft.move_tab(0, MoveTarget::Excluded).unwrap();
    assert_partition(&draft);
    let rust_id = draft.groups[0].id.clone();
    draft.delete_group(&rust_id).unwrap();
    assert_partition(&draft);

    let once = sanitize_preview_draft(&draft).unwrap();
    assert_eq!(sanitize_preview_draft(&once).unwrap(), once);
}

#[test]
fn hand_edited_json_is_repaired() {
    init_logging();
    let mut draft = fixture_draft();
    let ungrouped_id = draft.groups[2].id.clone();
    draft.delete_group(&ungrouped_id).unwrap();
    draft.groups.push(PreviewGroup {
        id: draft.groups[0].id.clone(),
        name: "x".repeat(100),
        tab_indices: vec![0, 4, 99],
        confidence: Some(f64::NAN),
        rationale: None,
        sample_titles: vec!["stale".to_string()],
    });
    draft.excluded_tab_indices = vec![4, 4, 3];

    let repaired = sanitize_preview_draft(&draft).unwrap();
    assert_partition(&repaired);
    let extra = repaired.groups.last().unwrap();
    assert_ne!(extra.id, repaired.groups[0].id);
    assert_eq!(extra.tab_indices, vec![4]);
    assert_eq!(extra.confidence, None);
    assert_eq!(extra.sample_titles, vec!["Quarterly budget sheet"]);
}

#[test]
fn apply_plan_conserves_tabs() {
    init_logging();
    let draft = fixture_draft();
    for allow_cross_window in [false, true] {
        let plan = plan_apply(&draft.tabs, &draft.groups, allow_cross_window);
        let skipped = plan.tab_count - plan.planned_tabs();
        assert_eq!(plan.planned_tabs() + skipped, draft.tabs.len());
        assert_eq!(plan.planned_tabs(), draft.summary().grouped_tabs);
    }

    let split = plan_apply(&draft.tabs, &draft.groups, false);
    // "Rust Async" spans windows 1 and 2.
    assert_eq!(split.groups.len(), draft.groups.len() + 1);
    let joined = plan_apply(&draft.tabs, &draft.groups, true);
    assert_eq!(joined.groups.len(), draft.groups.len());
}

#[test]
fn only_the_latest_archive_can_be_undone() {
    init_logging();
    let mut slot = UndoSlot::new();
    let first = slot.issue("tok_a", "arc_a", 0, UNDO_TTL_MS);
    let second = slot.issue("tok_b", "arc_b", 500, UNDO_TTL_MS);

    let err = slot.redeem(Some(&first.token_id), 1_000).unwrap_err();
    assert_eq!(err.code(), "UNDO_TOKEN_MISMATCH");
    assert_eq!(
        slot.redeem(Some(&second.token_id), 1_000).unwrap_err().code(),
        "NO_UNDO_TOKEN"
    );

    let third = slot.issue("tok_c", "arc_c", 2_000, UNDO_TTL_MS);
    assert_eq!(slot.redeem(None, 3_000).unwrap(), third);
    assert!(slot.peek().is_none());
}
