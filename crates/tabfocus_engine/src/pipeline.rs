use tabfocus_core::{cluster_tabs, post_process, AiRunMeta, PipelineOutcome, Settings, Tab};
use tabfocus_logging::{focus_info, focus_warn};

use crate::classify::Classifier;
use crate::enrich::{enrich_tabs, PageReader};

/// Produce guarded groups for `tabs`.
///
/// The classifier runs first; when enrichment is enabled and adds page context,
/// it runs once more over the enriched tabs and a failed second pass keeps the
/// first-pass groups. Any first-pass failure falls back to local clustering.
/// Never fails: every outcome covers every tab.
pub async fn build_groups(
    tabs: Vec<Tab>,
    settings: &Settings,
    classifier: &dyn Classifier,
    reader: &dyn PageReader,
) -> PipelineOutcome {
    let mut meta = AiRunMeta {
        primary_model: settings.model.clone(),
        fallback_model: settings.fallback_model.clone(),
        used_fallback_model: false,
        ai_error_code: None,
    };
    let mut working = tabs;
    let mut hint = String::new();
    let mut used_fallback = false;
    let mut enriched_context_used = false;

    let groups = match classifier.classify(&working, settings).await {
        Ok(first) => {
            meta = first.meta;
            let mut groups = first.groups;
            if settings.include_scraped_context {
                let enrichment = enrich_tabs(&working, &groups, reader).await;
                working = enrichment.tabs;
                hint = enrichment.hint;
                if enrichment.enriched {
                    enriched_context_used = true;
                    match classifier.classify(&working, settings).await {
                        Ok(second) => {
                            meta = second.meta;
                            groups = second.groups;
                        }
                        Err(err) => {
                            let code = err.code();
                            focus_warn!("Second classification pass failed: {}", err);
                            if hint.is_empty() {
                                hint = format!(
                                    "Second-pass AI enrichment failed ({code}). Kept first-pass groups."
                                );
                            }
                            meta.ai_error_code = Some(code);
                        }
                    }
                }
            }
            groups
        }
        Err(err) => {
            let code = err.code();
            focus_warn!("Classification failed, using local clustering: {}", err);
            used_fallback = true;
            hint = format!("AI request failed ({code}). Used local heuristic grouping.");
            meta.ai_error_code = Some(code);
            cluster_tabs(&working)
        }
    };

    let groups = post_process(&groups, &working);
    focus_info!(
        "Grouped {} tabs into {} groups (fallback: {}, enriched: {})",
        working.len(),
        groups.len(),
        used_fallback,
        enriched_context_used
    );

    PipelineOutcome {
        tabs: working,
        groups,
        used_fallback,
        enriched_context_used,
        hint,
        ai_meta: Some(meta),
    }
}
