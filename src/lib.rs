extern crate self as orthotype;

use std::fmt;
use std::str::FromStr;

#[doc(hidden)]
pub use serde_json;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod quote;
mod rules;

pub use api::{EngineOptions, ExecuteOptions, ExecuteResult, Typographer};
pub use engine::{
    CompiledRules, DocumentTraits, EngineConfig, EntityKind, HtmlEntityMode, LineEnding, ProtectedTag, QueueMetrics,
    RuleRegistry, RuleStep, RunMetrics, SafeTags,
};
pub use error::{Error, Result};
pub use quote::{QuoteTable, normalize_quotes};

/// Reserved code point that delimits placeholder tokens.
///
/// Tokens look like `U+10FFFD <index> U+10FFFD`. Input that already contains
/// this code point is escaped before any rule runs and restored afterwards.
pub const PLACEHOLDER_MARK: char = '\u{10FFFD}';

/// Locale label for rules that apply regardless of the active locale.
pub const COMMON_LOCALE: &str = "common";

/// Per-rule options, keyed by option name.
pub type OptionMap = serde_json::Map<String, serde_json::Value>;

/// Rule body: a pure function of the current text and the rule's context.
pub type Handler = fn(&str, &RuleContext<'_>) -> String;

// --- Rule identity ----------------------------------------------------------

/// Parsed `<locale>/<group>/<id>` rule name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleName {
    full: String,
    locale: String,
    group: String,
    id: String,
}

impl RuleName {
    pub fn full(&self) -> &str {
        &self.full
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl FromStr for RuleName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(locale), Some(group), Some(id), None)
                if !locale.is_empty() && !group.is_empty() && !id.is_empty() && !id.contains('*') =>
            {
                Ok(RuleName { full: s.to_string(), locale: locale.into(), group: group.into(), id: id.into() })
            }
            _ => Err(Error::InvalidRuleName(s.to_string())),
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// Which engine mode a rule is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LiveAffinity {
    #[default]
    Either,
    /// Only runs when the engine is in live mode.
    RequiredLive,
    /// Skipped when the engine is in live mode.
    RequiredNotLive,
}

impl LiveAffinity {
    pub fn allows(self, live: bool) -> bool {
        match self {
            LiveAffinity::Either => true,
            LiveAffinity::RequiredLive => live,
            LiveAffinity::RequiredNotLive => !live,
        }
    }
}

// --- Queues -----------------------------------------------------------------

/// Protected-span group. Groups are hidden in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SafeGroup {
    /// Tags added through `Typographer::add_protected_tag`.
    Own,
    /// Comments, declarations, raw blocks and (for HTML-like input) element tags.
    Html,
    Url,
}

impl SafeGroup {
    pub const ALL: [SafeGroup; 3] = [SafeGroup::Own, SafeGroup::Html, SafeGroup::Url];

    pub fn as_str(self) -> &'static str {
        match self {
            SafeGroup::Own => "own",
            SafeGroup::Html => "html",
            SafeGroup::Url => "url",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        SafeGroup::ALL.into_iter().find(|g| g.as_str() == s)
    }
}

/// Named execution phase of one `execute()` call.
///
/// ```text
/// start → hide-safe-tags-{own,html,url} → hide-safe-tags → utf → default
///       → html-entities → show-safe-tags-{own,html,url} → end
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Queue {
    Start,
    HideSafeTagsGroup(SafeGroup),
    HideSafeTags,
    Utf,
    #[default]
    Default,
    HtmlEntities,
    ShowSafeTagsGroup(SafeGroup),
    End,
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Queue::Start => f.write_str("start"),
            Queue::HideSafeTagsGroup(g) => write!(f, "hide-safe-tags-{}", g.as_str()),
            Queue::HideSafeTags => f.write_str("hide-safe-tags"),
            Queue::Utf => f.write_str("utf"),
            Queue::Default => f.write_str("default"),
            Queue::HtmlEntities => f.write_str("html-entities"),
            Queue::ShowSafeTagsGroup(g) => write!(f, "show-safe-tags-{}", g.as_str()),
            Queue::End => f.write_str("end"),
        }
    }
}

impl FromStr for Queue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let queue = match s {
            "start" => Queue::Start,
            "hide-safe-tags" => Queue::HideSafeTags,
            "utf" => Queue::Utf,
            "default" => Queue::Default,
            "html-entities" => Queue::HtmlEntities,
            "end" => Queue::End,
            _ => {
                if let Some(group) = s.strip_prefix("hide-safe-tags-").and_then(SafeGroup::parse) {
                    Queue::HideSafeTagsGroup(group)
                } else if let Some(group) = s.strip_prefix("show-safe-tags-").and_then(SafeGroup::parse) {
                    Queue::ShowSafeTagsGroup(group)
                } else {
                    return Err(Error::UnknownQueue(s.to_string()));
                }
            }
        };
        Ok(queue)
    }
}

/// How a rule's ordering index is derived from its group base index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleIndex {
    /// Use the group base index.
    #[default]
    Group,
    /// Group base index plus a signed offset.
    Offset(i32),
    /// Ignore the group base index.
    Absolute(i32),
}

impl From<i32> for RuleIndex {
    fn from(value: i32) -> Self {
        RuleIndex::Absolute(value)
    }
}

/// Strings are always offsets: `"+5"`, `"-10"`, `"20"`.
impl FromStr for RuleIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        digits.parse::<i32>().map(RuleIndex::Offset).map_err(|_| Error::InvalidIndex(s.to_string()))
    }
}

// --- Rule definitions ---------------------------------------------------------

/// Registration record for a main rule (see the `rule!` macro).
#[derive(Clone)]
pub struct RuleDef {
    pub name: String,
    pub handler: Handler,
    pub queue: Queue,
    pub index: RuleIndex,
    pub disabled: bool,
    pub live: LiveAffinity,
    pub settings: OptionMap,
}

/// Registration record for an inner rule (see the `inner_rule!` macro).
#[derive(Clone)]
pub struct InnerRuleDef {
    pub name: String,
    pub queue: Queue,
    pub live: LiveAffinity,
    pub handler: Handler,
}

impl fmt::Debug for RuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDef")
            .field("name", &self.name)
            .field("queue", &self.queue)
            .field("index", &self.index)
            .field("disabled", &self.disabled)
            .field("live", &self.live)
            .finish()
    }
}

impl fmt::Debug for InnerRuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InnerRuleDef").field("name", &self.name).field("queue", &self.queue).finish()
    }
}

/// A registered main rule.
#[derive(Clone)]
pub struct Rule {
    pub name: RuleName,
    pub handler: Handler,
    pub queue: Queue,
    /// Resolved ordering index (group base index applied).
    pub index: i32,
    pub enabled_by_default: bool,
    pub live: LiveAffinity,
    /// Declared defaults, copied into every engine's settings map.
    pub settings: OptionMap,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name.full())
            .field("queue", &self.queue)
            .field("index", &self.index)
            .field("handler", &"<function>")
            .field("enabled_by_default", &self.enabled_by_default)
            .field("live", &self.live)
            .finish()
    }
}

/// A registered inner rule. Runs before the main rules of its queue, with no
/// locale or enabled-state filtering.
#[derive(Clone)]
pub struct InnerRule {
    pub name: String,
    pub locale: String,
    pub id: String,
    pub queue: Queue,
    pub live: LiveAffinity,
    pub handler: Handler,
}

impl fmt::Debug for InnerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InnerRule").field("name", &self.name).field("queue", &self.queue).finish()
    }
}

// --- Handler context ----------------------------------------------------------

/// What a handler may observe about the current run.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Active locale of this `execute()` call.
    pub locale: &'a str,
    /// Settings of the rule being run (empty for inner rules).
    pub settings: &'a OptionMap,
    pub is_html: bool,
    pub live: bool,
    config: &'a EngineConfig,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(
        locale: &'a str,
        settings: &'a OptionMap,
        is_html: bool,
        live: bool,
        config: &'a EngineConfig,
    ) -> Self {
        RuleContext { locale, settings, is_html, live, config }
    }

    /// Option of this rule.
    pub fn setting(&self, key: &str) -> Option<&'a serde_json::Value> {
        self.settings.get(key)
    }

    /// Option of this rule, read as a non-negative integer.
    pub fn usize_setting(&self, key: &str) -> Option<usize> {
        self.setting(key).and_then(|v| v.as_u64()).and_then(|n| usize::try_from(n).ok())
    }

    /// Option of another rule, as configured on this engine.
    pub fn setting_of(&self, rule: &str, key: &str) -> Option<&'a serde_json::Value> {
        self.config.setting(rule, key)
    }

    /// Quote table configured for the active locale, if any.
    pub fn quote_table(&self) -> Option<QuoteTable> {
        self.setting_of(rules::QUOTE_RULE, self.locale).and_then(QuoteTable::from_settings)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const QUEUE_NAMES: [&str; 12] = [
        "start",
        "hide-safe-tags-own",
        "hide-safe-tags-html",
        "hide-safe-tags-url",
        "hide-safe-tags",
        "utf",
        "default",
        "html-entities",
        "show-safe-tags-own",
        "show-safe-tags-html",
        "show-safe-tags-url",
        "end",
    ];

    #[test]
    fn queue_names_round_trip() {
        for name in QUEUE_NAMES {
            let queue: Queue = name.parse().unwrap();
            assert_eq!(queue.to_string(), name);
        }
    }

    #[test]
    fn unknown_queue_names_are_rejected() {
        for name in ["middle", "hide-safe-tags-foo", "show-safe-tags-", "Start", ""] {
            match name.parse::<Queue>() {
                Err(Error::UnknownQueue(got)) => assert_eq!(got, name),
                other => panic!("{name:?} parsed as {other:?}"),
            }
        }
    }

    #[test]
    fn index_strings_are_offsets() {
        assert_eq!("+5".parse::<RuleIndex>().unwrap(), RuleIndex::Offset(5));
        assert_eq!("-10".parse::<RuleIndex>().unwrap(), RuleIndex::Offset(-10));
        assert_eq!(" 20 ".parse::<RuleIndex>().unwrap(), RuleIndex::Offset(20));
        assert!(matches!("x".parse::<RuleIndex>(), Err(Error::InvalidIndex(_))));
    }
}
