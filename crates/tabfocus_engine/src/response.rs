//! Parsing untrusted chat-completion output into validated suggestions.

use std::collections::HashSet;

use serde_json::Value;
use tabfocus_core::text::{clamp_chars, clean_label};
use tabfocus_core::{GroupSuggestion, MAX_RATIONALE_CHARS};

use crate::classify::{ClassifyError, ClassifyFailure};

pub const MAX_AI_GROUP_NAME_CHARS: usize = 60;

/// Parse a raw response body into groups over `tab_count` tabs.
pub fn parse_completion(body: &[u8], tab_count: usize) -> Result<Vec<GroupSuggestion>, ClassifyError> {
    let envelope: Value = serde_json::from_slice(body).map_err(|err| {
        ClassifyError::new(ClassifyFailure::InvalidJson, format!("response body: {err}"))
    })?;
    let content = message_content(&envelope)
        .ok_or_else(|| ClassifyError::new(ClassifyFailure::Empty, "no message content"))?;

    let parsed = parse_content(&content)?;
    let groups = parsed
        .get("groups")
        .and_then(Value::as_array)
        .map(|raw| validate_groups(raw, tab_count))
        .unwrap_or_default();
    if groups.is_empty() {
        return Err(ClassifyError::new(
            ClassifyFailure::NoValidGroups,
            "no group referenced a valid tab",
        ));
    }
    Ok(groups)
}

/// `choices[0].message.content`, either a string or a list of chunks.
fn message_content(envelope: &Value) -> Option<String> {
    let content = envelope.pointer("/choices/0/message/content")?;
    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(chunks) => chunks
            .iter()
            .map(|chunk| match chunk {
                Value::String(text) => text.as_str(),
                other => other.get("text").and_then(Value::as_str).unwrap_or(""),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

fn parse_content(content: &str) -> Result<Value, ClassifyError> {
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return Ok(value);
    }
    first_balanced_object(content)
        .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .ok_or_else(|| {
            ClassifyError::new(
                ClassifyFailure::InvalidJson,
                format!("unparseable content: {}", clamp_chars(content, 80)),
            )
        })
}

/// The first `{...}` span whose braces balance, ignoring braces in strings.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn validate_groups(raw: &[Value], tab_count: usize) -> Vec<GroupSuggestion> {
    raw.iter()
        .enumerate()
        .filter_map(|(position, group)| {
            let indices = valid_indices(group.get("tabIndices"), tab_count);
            if indices.is_empty() {
                return None;
            }
            let name = group
                .get("name")
                .and_then(Value::as_str)
                .map(|name| clean_label(name, MAX_AI_GROUP_NAME_CHARS))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("Group {}", position + 1));
            let confidence = group
                .get("confidence")
                .and_then(Value::as_f64)
                .filter(|value| value.is_finite())
                .map(|value| value.clamp(0.0, 1.0));
            let rationale = group
                .get("rationale")
                .and_then(Value::as_str)
                .map(|text| clean_label(text, MAX_RATIONALE_CHARS))
                .filter(|text| !text.is_empty());
            Some(GroupSuggestion {
                name,
                tab_indices: indices,
                confidence,
                rationale,
            })
        })
        .collect()
}

fn valid_indices(raw: Option<&Value>, tab_count: usize) -> Vec<usize> {
    let Some(values) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    values
        .iter()
        .filter_map(as_index)
        .filter(|&index| index < tab_count && seen.insert(index))
        .collect()
}

/// Non-negative integers only; `2.0` counts, `2.5` and `-1` do not.
fn as_index(value: &Value) -> Option<usize> {
    if let Some(index) = value.as_u64() {
        return usize::try_from(index).ok();
    }
    let float = value.as_f64()?;
    (float >= 0.0 && float.fract() == 0.0 && float <= usize::MAX as f64).then_some(float as usize)
}
