//! Token extraction and Jaccard similarity, the single comparison primitive
//! shared by clustering and guardrails.

use std::collections::{BTreeSet, HashMap};

use url::Url;

use crate::Tab;

pub const MIN_TOKEN_LEN: usize = 3;
const MIN_PATH_SEGMENT_LEN: usize = 4;

const STOP_WORDS: &[&str] = &[
    "with", "from", "about", "that", "this", "when", "where", "which", "what", "your", "have",
    "will", "just", "into", "using", "guide", "best", "video", "watch",
];

pub type TokenSet = BTreeSet<String>;

/// Lowercase alphanumeric tokens of at least three chars, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { ' ' })
        .collect();
    lowered
        .split_whitespace()
        .filter(|word| word.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Lowercased path segments of `url` long enough to carry meaning.
pub fn url_path_segments(url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(url) else {
        return Vec::new();
    };
    let Some(segments) = parsed.path_segments() else {
        return Vec::new();
    };
    segments
        .map(|segment| segment.trim().to_lowercase())
        .filter(|segment| segment.chars().count() >= MIN_PATH_SEGMENT_LEN)
        .collect()
}

/// Every token a tab contributes: title, page context and URL path.
pub fn tab_tokens(tab: &Tab) -> TokenSet {
    let mut tokens: TokenSet = tokenize(&tab.title).into_iter().collect();
    if let Some(context) = &tab.page_context {
        if let Some(description) = &context.description {
            tokens.extend(tokenize(description));
        }
        if let Some(snippet) = &context.snippet {
            tokens.extend(tokenize(snippet));
        }
        for heading in &context.headings {
            tokens.extend(tokenize(heading));
        }
        for hint in &context.site_hints {
            tokens.extend(tokenize(hint));
        }
    }
    if let Some(url) = &tab.url {
        for segment in url_path_segments(url) {
            tokens.extend(tokenize(&segment));
        }
    }
    tokens
}

/// Jaccard overlap; 0 when either side is empty.
pub fn jaccard(a: &TokenSet, b: &TokenSet) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

pub fn similarity(a: &Tab, b: &Tab) -> f64 {
    jaccard(&tab_tokens(a), &tab_tokens(b))
}

/// Token sets for a whole tab list, computed once per stage.
#[derive(Debug, Clone)]
pub struct TokenIndex {
    sets: Vec<TokenSet>,
}

impl TokenIndex {
    pub fn build(tabs: &[Tab]) -> Self {
        Self {
            sets: tabs.iter().map(tab_tokens).collect(),
        }
    }

    pub fn tokens(&self, index: usize) -> &TokenSet {
        static EMPTY: TokenSet = BTreeSet::new();
        self.sets.get(index).unwrap_or(&EMPTY)
    }

    pub fn similarity(&self, a: usize, b: usize) -> f64 {
        jaccard(self.tokens(a), self.tokens(b))
    }

    /// Mean pairwise similarity; a group of zero or one tab is fully cohesive.
    pub fn cohesion(&self, indices: &[usize]) -> f64 {
        if indices.len() <= 1 {
            return 1.0;
        }
        let mut total = 0.0;
        let mut pairs = 0usize;
        for (pos, &a) in indices.iter().enumerate() {
            for &b in &indices[pos + 1..] {
                total += self.similarity(a, b);
                pairs += 1;
            }
        }
        total / pairs as f64
    }

    pub fn tally(&self, indices: &[usize]) -> TokenTally {
        let mut tally = TokenTally::default();
        for &index in indices {
            for token in self.tokens(index) {
                tally.add(token);
            }
        }
        tally
    }
}

/// Token frequency counter; equal counts rank by first appearance.
#[derive(Debug, Clone, Default)]
pub struct TokenTally {
    counts: HashMap<String, (usize, usize)>,
}

impl TokenTally {
    pub fn add(&mut self, token: &str) {
        let next_seen = self.counts.len();
        self.counts
            .entry(token.to_string())
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, next_seen));
    }

    pub fn count(&self, token: &str) -> usize {
        self.counts.get(token).map_or(0, |(count, _)| *count)
    }

    pub fn ranked(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<_> = self
            .counts
            .iter()
            .map(|(token, &(count, seen))| (token.clone(), count, seen))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        entries
            .into_iter()
            .map(|(token, count, _)| (token, count))
            .collect()
    }

    pub fn top(&self) -> Option<(String, usize)> {
        self.ranked().into_iter().next()
    }

    /// Most frequent token that appears at least twice.
    pub fn top_shared(&self) -> Option<String> {
        self.top()
            .filter(|(_, count)| *count >= 2)
            .map(|(token, _)| token)
    }
}
