use url::Url;

use crate::text::clamp_chars;
use crate::{HostTab, Tab};

pub const MAX_TITLE_CHARS: usize = 180;
pub const UNTITLED_TAB: &str = "Untitled Tab";
pub const UNKNOWN_DOMAIN: &str = "unknown";

const BLOCKED_PREFIXES: [&str; 6] = [
    "chrome://",
    "chrome-extension://",
    "edge://",
    "about:",
    "view-source:",
    "devtools://",
];

/// Only ordinary web pages can be organized.
pub fn is_supported_url(url: &str) -> bool {
    if BLOCKED_PREFIXES.iter().any(|prefix| url.starts_with(prefix)) {
        return false;
    }
    url.starts_with("http://") || url.starts_with("https://")
}

/// Lowercase host without a leading `www.`, or `"unknown"`.
pub fn domain_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
        .map(|host| host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

pub fn normalize_title(title: Option<&str>) -> String {
    match title {
        Some(title) => clamp_chars(title.trim(), MAX_TITLE_CHARS),
        None => UNTITLED_TAB.to_string(),
    }
}

/// Keep the supported tabs from a host listing, in host order.
pub fn normalize_tabs(raw: &[HostTab], include_full_url: bool) -> Vec<Tab> {
    raw.iter()
        .filter_map(|tab| {
            let url = tab.url.as_deref().filter(|url| is_supported_url(url))?;
            Some(Tab {
                chrome_tab_id: tab.id,
                window_id: tab.window_id,
                tab_index: tab.index,
                title: normalize_title(tab.title.as_deref()),
                domain: domain_from_url(url),
                url: include_full_url.then(|| url.to_string()),
                pinned: tab.pinned,
                prior_group_id: tab.group_id.filter(|group_id| *group_id >= 0),
                page_context: None,
            })
        })
        .collect()
}
