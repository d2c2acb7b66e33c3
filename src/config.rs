//! Settings, rule set configuration and page layout.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::dom::Selector;
use crate::error::{Error, Result};
use crate::rule::{default_rules, Rule};

fn default_true() -> bool {
    true
}

/// User settings consumed by the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Master switch
    #[serde(default = "default_true")]
    pub extension_enabled: bool,
    /// Report flagged posts to the local log
    #[serde(default = "default_true", alias = "localStorageEnabled")]
    pub enable_local_logging: bool,
    /// Render the show original / show modified toggle
    #[serde(default = "default_true")]
    pub show_modification_badge: bool,
    /// Carried for stored settings compatibility; semantic rules stay inert
    #[serde(default)]
    pub semantic_analysis_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extension_enabled: true,
            enable_local_logging: true,
            show_modification_badge: true,
            semantic_analysis_enabled: false,
        }
    }
}

/// Settings plus the ordered rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            rules: default_rules(),
        }
    }
}

impl Configuration {
    pub fn new(settings: Settings, rules: Vec<Rule>) -> Self {
        Self { settings, rules }
    }

    /// Parse a YAML configuration from a reader.
    pub fn from_yaml_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load a configuration file. `.json` files are read as JSON, `.yaml` and
    /// `.yml` as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match extension(path).as_str() {
            "json" => Self::from_json_str(&content),
            "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
            other => Err(Error::Config(format!(
                "unsupported configuration format: {:?}",
                other
            ))),
        }
    }

    /// Save to a file, choosing the format from the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match extension(path).as_str() {
            "json" => serde_json::to_string_pretty(self)?,
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported configuration format: {:?}",
                    other
                )))
            }
        };
        fs::write(path, content)?;
        Ok(())
    }

    /// Rules that take part in evaluation, in priority order.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|rule| rule.enabled)
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Where things live on the target page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    /// One feed item
    pub post: Selector,
    /// Primary text of a post
    pub text_region: Selector,
    /// Block holding display name and `@handle`
    pub author: Selector,
    /// Link to the post itself
    pub permalink: Selector,
    /// Prefix for relative permalinks
    pub base_url: String,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            post: builtin_selector(r#"article[data-testid="tweet"]"#),
            text_region: builtin_selector(r#"div[data-testid="tweetText"]"#),
            author: builtin_selector(r#"div[data-testid="User-Name"]"#),
            permalink: builtin_selector(r#"a[href*="/status/"]"#),
            base_url: "https://x.com".to_string(),
        }
    }
}

fn builtin_selector(s: &str) -> Selector {
    Selector::parse(s).unwrap_or_else(|e| panic!("built-in selector {s} is invalid: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Effect, RuleKind};

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.extension_enabled);
        assert!(settings.enable_local_logging);
        assert!(settings.show_modification_badge);
    }

    #[test]
    fn test_settings_legacy_alias() {
        let settings: Settings =
            serde_json::from_str(r#"{"extensionEnabled":false,"localStorageEnabled":false}"#)
                .unwrap();
        assert!(!settings.extension_enabled);
        assert!(!settings.enable_local_logging);
    }

    #[test]
    fn test_yaml_configuration() {
        let yaml = r#"
settings:
  showModificationBadge: false
rules:
  - id: ads
    type: literal
    pattern: "ad | promo"
    effect: hide
    matchWholeWord: true
  - id: bait
    type: wildcard
    pattern: "click*"
    replacementText: "**[bait]**"
    effect: replace
"#;
        let config = Configuration::from_yaml_reader(yaml.as_bytes()).unwrap();
        assert!(!config.settings.show_modification_badge);
        assert!(config.settings.extension_enabled);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].effect, Effect::Hide);
        assert!(config.rules[0].match_whole_word);
        assert_eq!(config.rules[1].kind, RuleKind::Wildcard);
        assert_eq!(config.rules[1].replacement_text, "**[bait]**");
    }

    #[test]
    fn test_load_and_save_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::default();

        let json_path = dir.path().join("rules.json");
        config.save(&json_path).unwrap();
        assert_eq!(Configuration::load(&json_path).unwrap(), config);

        let yaml_path = dir.path().join("rules.yml");
        config.save(&yaml_path).unwrap();
        assert_eq!(Configuration::load(&yaml_path).unwrap(), config);

        let txt_path = dir.path().join("rules.txt");
        assert!(matches!(config.save(&txt_path), Err(Error::Config(_))));
    }

    #[test]
    fn test_enabled_rules_keep_order() {
        let config = Configuration::new(
            Settings::default(),
            vec![
                Rule::literal("a", "x"),
                Rule::literal("b", "y").enabled(false),
                Rule::literal("c", "z"),
            ],
        );
        let ids: Vec<_> = config.enabled_rules().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_page_layout_default() {
        let layout = PageLayout::default();
        assert_eq!(layout.post.as_str(), r#"article[data-testid="tweet"]"#);
        let json = serde_json::to_string(&layout).unwrap();
        let back: PageLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layout);
    }
}
