use serde_json::{json, Value};
use tabfocus_core::Tab;

const TEMPERATURE: f64 = 0.2;

const SYSTEM_PROMPT: &str = "You are a browser tab organizer. Return JSON only with shape \
{\"groups\":[{\"name\":\"...\",\"tabIndices\":[0,1],\"confidence\":0.0,\"rationale\":\"...\"}]}. \
Group by user intent/topic. Do not group primarily by domain. Same-domain tabs can belong to \
different topics. Use tab adjacency as a weak signal only.";

const USER_PREAMBLE: &str = "Group these tabs by topic and intent.\nRules:\n\
- Avoid giant single-domain buckets.\n\
- Keep unrelated tasks separate.\n\
- Keep group names specific and short.\nTabs:\n";

/// One line per tab; the line's `id` is the tab's position in `tabs`.
pub fn describe_tabs(tabs: &[Tab], include_full_url: bool) -> String {
    tabs.iter()
        .enumerate()
        .map(|(index, tab)| describe_tab(index, tab, include_full_url))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_tab(index: usize, tab: &Tab, include_full_url: bool) -> String {
    let mut pieces = vec![
        format!("id:{index}"),
        format!("window:{}", tab.window_id),
        format!("position:{}", tab.tab_index),
        format!("title:{}", tab.title),
        format!("domain:{}", tab.domain),
    ];
    if include_full_url {
        if let Some(url) = &tab.url {
            pieces.push(format!("url:{url}"));
        }
    }
    if let Some(context) = &tab.page_context {
        if let Some(description) = &context.description {
            pieces.push(format!("description:{description}"));
        }
        if let Some(snippet) = &context.snippet {
            pieces.push(format!("snippet:{snippet}"));
        }
        if !context.headings.is_empty() {
            pieces.push(format!("headings:{}", context.headings.join(" || ")));
        }
        if !context.site_hints.is_empty() {
            pieces.push(format!("hints:{}", context.site_hints.join(", ")));
        }
    }
    pieces.join(" | ")
}

/// Chat-completions request body asking for strict JSON groups.
pub fn build_request(tabs: &[Tab], model: &str, include_full_url: bool) -> Value {
    json!({
        "model": model,
        "temperature": TEMPERATURE,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            {
                "role": "user",
                "content": format!("{USER_PREAMBLE}{}", describe_tabs(tabs, include_full_url)),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabfocus_core::PageContext;

    fn tab() -> Tab {
        Tab {
            chrome_tab_id: 42,
            window_id: 7,
            tab_index: 3,
            title: "Tokio select".to_string(),
            domain: "docs.rs".to_string(),
            url: Some("https://docs.rs/tokio/latest/tokio/macro.select.html".to_string()),
            pinned: false,
            prior_group_id: None,
            page_context: Some(PageContext {
                description: Some("Waits on multiple branches".to_string()),
                headings: vec!["Macro select".to_string(), "Examples".to_string()],
                snippet: None,
                site_hints: vec!["tokio".to_string(), "macro".to_string()],
            }),
        }
    }

    #[test]
    fn tab_line_lists_fields_in_order() {
        let line = describe_tabs(&[tab()], true);
        assert_eq!(
            line,
            "id:0 | window:7 | position:3 | title:Tokio select | domain:docs.rs | \
             url:https://docs.rs/tokio/latest/tokio/macro.select.html | \
             description:Waits on multiple branches | headings:Macro select || Examples | \
             hints:tokio, macro"
        );
    }

    #[test]
    fn url_is_omitted_when_disabled() {
        assert!(!describe_tabs(&[tab()], false).contains("url:"));
    }

    #[test]
    fn request_carries_model_and_json_mode() {
        let body = build_request(&[tab()], "gpt-4.1", true);
        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.ends_with("hints:tokio, macro"));
    }
}
