//! Rule registration, ordering and indexing.
//!
//! This module holds the *static* side of the engine: the rule list and the
//! structures derived from it once, before any text is processed.
//!
//! Work is split into two phases:
//!
//! 1. **Register** (`RuleRegistry`): append rule definitions, resolve each
//!    rule's ordering index from its group, and flag the list for re-sorting.
//! 2. **Compile** (`CompiledRules`): sort once, index rules by queue and freeze
//!    the result. A compiled set is immutable and shared between engines.
//!
//! ## Ordering
//!
//! ```text
//! index = group base            (RuleIndex::Group)
//!       | group base + offset   (RuleIndex::Offset)
//!       | absolute              (RuleIndex::Absolute)
//! ```
//!
//! Rules with equal indices keep their registration order (stable sort).
//!
//! ## Invariants
//!
//! - One entry per full rule name. Registering a name twice replaces the
//!   definition in place (last wins) and records a duplicate warning.
//! - `QueueIndex` entries are positions into `CompiledRules::rules` and stay
//!   aligned with it.

use std::collections::{BTreeSet, HashMap};

use crate::{COMMON_LOCALE, Error, InnerRule, InnerRuleDef, Queue, Result, Rule, RuleDef, RuleIndex, RuleName};

/// Default base index per rule group.
const GROUP_INDEXES: &[(&str, i32)] = &[
    ("symbols", 110),
    ("space", 210),
    ("dash", 310),
    ("punctuation", 410),
    ("nbsp", 510),
    ("money", 610),
    ("date", 710),
    ("other", 810),
    ("number", 910),
    ("optalign", 1010),
    ("typo", 1110),
    ("html", 1210),
];

/// Append-only rule registry.
#[derive(Debug)]
pub struct RuleRegistry {
    groups: HashMap<String, i32>,
    rules: Vec<Rule>,
    inner: Vec<InnerRule>,
    extra_locales: Vec<String>,
    duplicates: Vec<String>,
    needs_sort: bool,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    /// Empty registry with the default group indexes.
    pub fn new() -> Self {
        RuleRegistry {
            groups: GROUP_INDEXES.iter().map(|(g, i)| (g.to_string(), *i)).collect(),
            rules: Vec::new(),
            inner: Vec::new(),
            extra_locales: Vec::new(),
            duplicates: Vec::new(),
            needs_sort: false,
        }
    }

    /// Add or override a group base index.
    pub fn with_group(mut self, group: impl Into<String>, base: i32) -> Self {
        self.groups.insert(group.into(), base);
        self
    }

    /// Declare a locale that has settings but no rules of its own.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.extra_locales.push(locale.into());
        self
    }

    /// Register a main rule.
    pub fn register(&mut self, def: RuleDef) -> Result<&mut Self> {
        let name: RuleName = def.name.parse()?;
        let base = *self
            .groups
            .get(name.group())
            .ok_or_else(|| Error::UnknownGroup { rule: def.name.clone(), group: name.group().to_string() })?;

        let index = match def.index {
            RuleIndex::Group => base,
            RuleIndex::Offset(offset) => base + offset,
            RuleIndex::Absolute(index) => index,
        };

        let rule = Rule {
            name,
            handler: def.handler,
            queue: def.queue,
            index,
            enabled_by_default: !def.disabled,
            live: def.live,
            settings: def.settings,
        };

        match self.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => {
                tracing::warn!(rule = %rule.name, "duplicate rule registration, keeping the last definition");
                self.duplicates.push(rule.name.full().to_string());
                *existing = rule;
            }
            None => self.rules.push(rule),
        }

        self.needs_sort = true;
        Ok(self)
    }

    /// Register an inner rule. Inner rules keep insertion order.
    pub fn register_inner(&mut self, def: InnerRuleDef) -> Result<&mut Self> {
        let (locale, id) = def.name.split_once('/').ok_or_else(|| Error::InvalidRuleName(def.name.clone()))?;
        if locale.is_empty() || id.is_empty() {
            return Err(Error::InvalidRuleName(def.name.clone()));
        }

        self.inner.push(InnerRule {
            locale: locale.to_string(),
            id: id.to_string(),
            name: def.name,
            queue: def.queue,
            live: def.live,
            handler: def.handler,
        });
        Ok(self)
    }

    /// Rules in execution order. Sorts lazily after registrations.
    pub fn rules(&mut self) -> &[Rule] {
        self.sort_if_needed();
        &self.rules
    }

    /// Exact lookup by full name.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name.full() == name)
    }

    /// Names registered more than once, in the order the duplicates were seen.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Freeze the registry into an immutable, indexed rule set.
    pub fn compile(mut self) -> CompiledRules {
        self.sort_if_needed();

        let mut index = QueueIndex::default();
        for (pos, rule) in self.rules.iter().enumerate() {
            index.rules.entry(rule.queue).or_default().push(pos);
        }
        for (pos, rule) in self.inner.iter().enumerate() {
            index.inner.entry(rule.queue).or_default().push(pos);
        }

        let locales = self
            .rules
            .iter()
            .map(|r| r.name.locale())
            .chain(self.inner.iter().map(|r| r.locale.as_str()))
            .chain(self.extra_locales.iter().map(String::as_str))
            .filter(|l| *l != COMMON_LOCALE)
            .map(str::to_string)
            .collect();

        CompiledRules { rules: self.rules, inner: self.inner, index, locales, duplicates: self.duplicates }
    }

    fn sort_if_needed(&mut self) {
        if self.needs_sort {
            // `sort_by_key` is stable: equal indices keep registration order.
            self.rules.sort_by_key(|r| r.index);
            self.needs_sort = false;
        }
    }
}

/// Positions of rules per queue.
#[derive(Debug, Default)]
pub struct QueueIndex {
    pub rules: HashMap<Queue, Vec<usize>>,
    pub inner: HashMap<Queue, Vec<usize>>,
}

/// Sorted, queue-indexed and immutable rule set.
#[derive(Debug)]
pub struct CompiledRules {
    rules: Vec<Rule>,
    inner: Vec<InnerRule>,
    index: QueueIndex,
    locales: BTreeSet<String>,
    duplicates: Vec<String>,
}

impl CompiledRules {
    /// All main rules in execution order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn inner_rules(&self) -> &[InnerRule] {
        &self.inner
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name.full() == name)
    }

    /// Main rules of `queue`, in execution order.
    pub fn rules_for(&self, queue: Queue) -> impl Iterator<Item = &Rule> {
        self.index.rules.get(&queue).into_iter().flatten().map(|&pos| &self.rules[pos])
    }

    /// Inner rules of `queue`, in insertion order.
    pub fn inner_rules_for(&self, queue: Queue) -> impl Iterator<Item = &InnerRule> {
        self.index.inner.get(&queue).into_iter().flatten().map(|&pos| &self.inner[pos])
    }

    /// Locales known from rule names (`common` excluded), sorted.
    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.locales.iter().map(String::as_str)
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.contains(locale)
    }

    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}
