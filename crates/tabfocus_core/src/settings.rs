use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o-mini";

/// Which windows a preview run collects tabs from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizeScope {
    #[default]
    All,
    /// The last focused window only.
    Current,
}

/// User settings. Keys missing from a stored value fall back one by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub openai_api_key: String,
    pub model: String,
    pub fallback_model: String,
    pub include_full_url: bool,
    pub include_scraped_context: bool,
    pub organize_scope: OrganizeScope,
    pub allow_cross_window_grouping: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            include_full_url: true,
            include_scraped_context: true,
            organize_scope: OrganizeScope::All,
            allow_cross_window_grouping: false,
        }
    }
}

impl Settings {
    pub fn has_api_key(&self) -> bool {
        !self.openai_api_key.trim().is_empty()
    }

    /// The model for the single retry, when it would differ from the first try.
    pub fn retry_model(&self) -> Option<&str> {
        let fallback = self.fallback_model.trim();
        (!fallback.is_empty() && fallback != self.model.trim()).then_some(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"model":"gpt-4o","organizeScope":"current"}"#).unwrap();
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.organize_scope, OrganizeScope::Current);
        assert_eq!(settings.fallback_model, DEFAULT_FALLBACK_MODEL);
        assert!(settings.include_full_url);
        assert!(!settings.allow_cross_window_grouping);
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(value["allowCrossWindowGrouping"], serde_json::json!(false));
        assert_eq!(value["organizeScope"], serde_json::json!("all"));
    }

    #[test]
    fn retry_model_skips_duplicates() {
        let mut settings = Settings::default();
        assert_eq!(settings.retry_model(), Some("gpt-4o-mini"));
        settings.fallback_model = "gpt-4.1".to_string();
        assert_eq!(settings.retry_model(), None);
        settings.fallback_model = "  ".to_string();
        assert_eq!(settings.retry_model(), None);
    }
}
