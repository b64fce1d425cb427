//! Per-engine configuration.
//!
//! `EngineConfig` is the mutable half of an engine: which rules are on, and
//! the option values each rule reads. It is seeded from a `CompiledRules`
//! snapshot (enabled-by-default flags and declared settings) and then changed
//! through masks and `set_setting`.
//!
//! ## Masks
//!
//! ```text
//! "ru/number/comma"   exact name, toggles one entry (registered or not)
//! "ru/optalign/*"     `*` matches any run of characters; the mask is anchored
//! "*"                 every registered rule
//! ```
//!
//! Wildcard masks are expanded against the rules registered at the time of
//! the call.

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::entities::HtmlEntityMode;
use super::registry::CompiledRules;
use crate::{COMMON_LOCALE, OptionMap, Result};

/// Line-break style of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum LineEnding {
    #[default]
    #[serde(rename = "LF")]
    Lf,
    #[serde(rename = "CR")]
    Cr,
    #[serde(rename = "CRLF")]
    CrLf,
}

impl LineEnding {
    /// `\r\n` and lone `\r` become `\n`.
    pub fn normalize(text: &str) -> String {
        if !text.contains('\r') {
            return text.to_string();
        }
        text.replace("\r\n", "\n").replace('\r', "\n")
    }

    /// Convert `\n` line breaks to this style.
    pub fn apply(self, text: &str) -> String {
        match self {
            LineEnding::Lf => text.to_string(),
            LineEnding::Cr => text.replace('\n', "\r"),
            LineEnding::CrLf => text.replace('\n', "\r\n"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub locale: String,
    pub line_ending: LineEnding,
    pub live: bool,
    pub html_entity: HtmlEntityMode,
    enabled: HashMap<String, bool>,
    settings: HashMap<String, OptionMap>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            locale: COMMON_LOCALE.to_string(),
            line_ending: LineEnding::default(),
            live: false,
            html_entity: HtmlEntityMode::default(),
            enabled: HashMap::new(),
            settings: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Enabled flags and settings copied from each rule's declared defaults.
    pub fn seeded(rules: &CompiledRules) -> Self {
        let mut config = EngineConfig::default();
        for rule in rules.rules() {
            config.enabled.insert(rule.name.full().to_string(), rule.enabled_by_default);
            if !rule.settings.is_empty() {
                config.settings.insert(rule.name.full().to_string(), rule.settings.clone());
            }
        }
        config
    }

    /// Enable or disable every rule matched by `mask`. Returns the number of
    /// entries touched.
    pub fn set_enabled(&mut self, rules: &CompiledRules, mask: &str, enabled: bool) -> Result<usize> {
        if !mask.contains('*') {
            self.enabled.insert(mask.to_string(), enabled);
            return Ok(1);
        }

        let pattern = mask.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
        let re = Regex::new(&format!("^{pattern}$"))?;

        let mut touched = 0;
        for rule in rules.rules().iter().filter(|r| re.is_match(r.name.full())) {
            self.enabled.insert(rule.name.full().to_string(), enabled);
            touched += 1;
        }
        tracing::debug!(mask, enabled, touched, "applied rule mask");
        Ok(touched)
    }

    /// Unknown names are disabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).copied().unwrap_or(false)
    }

    pub fn setting(&self, rule: &str, key: &str) -> Option<&Value> {
        self.settings.get(rule).and_then(|s| s.get(key))
    }

    pub fn set_setting(&mut self, rule: &str, key: &str, value: Value) {
        self.settings.entry(rule.to_string()).or_default().insert(key.to_string(), value);
    }

    /// All options of `rule`, or an empty map.
    pub fn settings_for(&self, rule: &str) -> &OptionMap {
        static EMPTY: once_cell::sync::Lazy<OptionMap> = once_cell::sync::Lazy::new(OptionMap::new);
        self.settings.get(rule).unwrap_or(&EMPTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RuleContext, RuleRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn keep(text: &str, _: &RuleContext<'_>) -> String {
        text.to_string()
    }

    fn compiled() -> CompiledRules {
        let mut registry = RuleRegistry::new();
        for def in [
            rule! { name: "ru/number/comma", handler: keep },
            rule! { name: "ru/number/ordinals", handler: keep },
            rule! { name: "ru/optalign/quote", disabled: true, handler: keep },
            rule! { name: "ru/optalign/bracket", disabled: true, handler: keep },
            rule! { name: "common/nbsp/x", settings: json!({"length": 3}), handler: keep },
        ] {
            registry.register(def).unwrap();
        }
        registry.compile()
    }

    #[test]
    fn seeds_from_rule_defaults() {
        let rules = compiled();
        let config = EngineConfig::seeded(&rules);
        assert!(config.is_enabled("ru/number/comma"));
        assert!(!config.is_enabled("ru/optalign/quote"));
        assert!(!config.is_enabled("not/a/rule"));
        assert_eq!(config.setting("common/nbsp/x", "length"), Some(&json!(3)));
        assert!(config.settings_for("ru/number/comma").is_empty());
    }

    #[test]
    fn wildcard_masks_are_isolated() {
        let rules = compiled();
        let mut config = EngineConfig::seeded(&rules);

        assert_eq!(config.set_enabled(&rules, "ru/optalign/*", true).unwrap(), 2);
        assert!(config.is_enabled("ru/optalign/quote"));
        assert_eq!(config.set_enabled(&rules, "ru/optalign/*", false).unwrap(), 2);
        assert!(!config.is_enabled("ru/optalign/bracket"));

        assert!(config.is_enabled("ru/number/comma"));
        assert!(config.is_enabled("ru/number/ordinals"));
    }

    #[test]
    fn masks_are_anchored() {
        let rules = compiled();
        let mut config = EngineConfig::seeded(&rules);

        assert_eq!(config.set_enabled(&rules, "number/*", false).unwrap(), 0);
        assert_eq!(config.set_enabled(&rules, "*/comma", false).unwrap(), 1);
        assert!(!config.is_enabled("ru/number/comma"));
        assert!(config.is_enabled("ru/number/ordinals"));

        assert_eq!(config.set_enabled(&rules, "ru/num.er/*", true).unwrap(), 0);
        assert_eq!(config.set_enabled(&rules, "*", true).unwrap(), 5);
    }

    #[test]
    fn exact_names_toggle_unregistered_entries() {
        let rules = compiled();
        let mut config = EngineConfig::seeded(&rules);
        config.set_enabled(&rules, "xx/space/later", true).unwrap();
        assert!(config.is_enabled("xx/space/later"));
    }

    #[test]
    fn settings_round_trip() {
        let rules = compiled();
        let mut config = EngineConfig::seeded(&rules);
        config.set_setting("common/nbsp/x", "length", json!(5));
        config.set_setting("common/nbsp/y", "flag", json!(true));
        assert_eq!(config.setting("common/nbsp/x", "length"), Some(&json!(5)));
        assert_eq!(config.setting("common/nbsp/y", "flag"), Some(&json!(true)));
        assert_eq!(config.setting("common/nbsp/y", "missing"), None);
    }

    #[test]
    fn line_endings() {
        assert_eq!(LineEnding::normalize("a\r\nb\rc\n"), "a\nb\nc\n");
        assert_eq!(LineEnding::CrLf.apply("a\nb"), "a\r\nb");
        assert_eq!(LineEnding::Cr.apply("a\nb"), "a\rb");
        let parsed: LineEnding = serde_json::from_value(json!("CRLF")).unwrap();
        assert_eq!(parsed, LineEnding::CrLf);
    }
}
