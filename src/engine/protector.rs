//! Safe-region protection.
//!
//! Spans that rules must never touch (markup, raw blocks, URLs, user-declared
//! regions) are swapped for opaque placeholder tokens while the rule queues run
//! and swapped back afterwards.
//!
//! ```text
//! "<pre>a  b</pre> x"  ──hide──>  "\u{10FFFD}0\u{10FFFD} x"  ──rules──>  ...  ──show──>  "<pre>a  b</pre> x"
//!                                  spans[0] = (html, "<pre>a  b</pre>")
//! ```
//!
//! Groups are hidden in `SafeGroup::ALL` order (`own`, `html`, `url`) and
//! shown in the same order. A span recorded by a later group may contain the
//! tokens of an earlier group; showing expands those recursively.
//!
//! ## Reserved code point
//!
//! `PLACEHOLDER_MARK` already present in the input is escaped into
//! reserved-origin spans first. Showing a safe group leaves reserved tokens in
//! place; they are only restored by `restore_reserved`, at the very end of a
//! run.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::{Error, PLACEHOLDER_MARK, Result, SafeGroup};

/// Raw blocks whose whole content is protected.
const RAW_BLOCKS: &[&str] = &["code", "kbd", "object", "pre", "samp", "script", "style", "var"];

static HTML_BUILTINS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let mut patterns = vec![
        regex!(r"(?s)<!--.*?-->").clone(),
        regex!(r"(?is)<!ENTITY.*?>").clone(),
        regex!(r"(?is)<!DOCTYPE.*?>").clone(),
        regex!(r"(?is)<\?xml.*?\?>").clone(),
        regex!(r"(?s)<!\[CDATA\[.*?\]\]>").clone(),
    ];
    patterns.extend(RAW_BLOCKS.iter().map(|tag| {
        Regex::new(&format!(r"(?is)<{tag}(?:\s[^>]*?)?>.*?</{tag}>")).expect("raw block pattern is valid")
    }));
    patterns
});

/// A user-declared protected region.
#[derive(Debug, Clone)]
pub enum ProtectedTag {
    /// Start and end delimiters plus an optional body pattern (`.*?` when
    /// absent). All three are regex fragments; the combined pattern is
    /// case-insensitive and lets `.` match newlines.
    Delimited { start: String, end: String, inner: Option<String> },
    /// A complete pattern.
    Pattern(String),
    Regex(Regex),
}

impl ProtectedTag {
    pub fn delimited(start: impl Into<String>, end: impl Into<String>) -> Self {
        ProtectedTag::Delimited { start: start.into(), end: end.into(), inner: None }
    }

    pub fn with_inner(start: impl Into<String>, end: impl Into<String>, inner: impl Into<String>) -> Self {
        ProtectedTag::Delimited { start: start.into(), end: end.into(), inner: Some(inner.into()) }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        ProtectedTag::Pattern(pattern.into())
    }

    fn compile(&self) -> Result<Regex> {
        let regex = match self {
            ProtectedTag::Delimited { start, end, inner } => {
                if start.is_empty() || end.is_empty() {
                    return Err(Error::InvalidProtectedTag("start and end delimiters must not be empty".into()));
                }
                let inner = inner.as_deref().unwrap_or(".*?");
                Regex::new(&format!("(?is)(?:{start})(?:{inner})(?:{end})"))?
            }
            ProtectedTag::Pattern(pattern) => Regex::new(pattern)?,
            ProtectedTag::Regex(regex) => regex.clone(),
        };

        if regex.is_match("") {
            return Err(Error::InvalidProtectedTag(format!("pattern '{}' matches the empty string", regex.as_str())));
        }
        Ok(regex)
    }
}

impl From<Regex> for ProtectedTag {
    fn from(regex: Regex) -> Self {
        ProtectedTag::Regex(regex)
    }
}

/// The set of protected patterns of one engine: user tags plus builtins.
#[derive(Debug, Clone, Default)]
pub struct SafeTags {
    own: Vec<Regex>,
}

impl SafeTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and add a user tag (group `own`).
    pub fn add(&mut self, tag: ProtectedTag) -> Result<&mut Self> {
        self.own.push(tag.compile()?);
        Ok(self)
    }

    pub fn own_len(&self) -> usize {
        self.own.len()
    }

    fn patterns(&self, group: SafeGroup, html_likely: bool) -> Vec<&Regex> {
        match group {
            SafeGroup::Own => self.own.iter().collect(),
            SafeGroup::Html => {
                let mut patterns: Vec<&Regex> = HTML_BUILTINS.iter().collect();
                if html_likely {
                    patterns.push(regex!(r"(?is)</?[a-z][^<>]*>"));
                }
                patterns
            }
            SafeGroup::Url => vec![regex!(r"(?:https?|file|ftp)://[a-zA-Z0-9/+\-=%&:_.~?]+[a-zA-Z0-9#+]*")],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Group(SafeGroup),
    Reserved,
}

#[derive(Debug, Clone, Copy)]
enum Select {
    Group(SafeGroup),
    AnyGroup,
    Reserved,
}

impl Select {
    fn matches(self, origin: Origin) -> bool {
        match (self, origin) {
            (Select::Group(g), Origin::Group(o)) => g == o,
            (Select::AnyGroup, Origin::Group(_)) => true,
            (Select::Reserved, Origin::Reserved) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
struct Span {
    origin: Origin,
    original: String,
}

/// First non-empty match of `re` at or after `start`. Empty matches are
/// stepped over one character at a time.
fn find_non_empty<'h>(re: &Regex, text: &'h str, mut start: usize) -> Option<regex::Match<'h>> {
    loop {
        let m = re.find_at(text, start)?;
        if !m.is_empty() {
            return Some(m);
        }
        start = m.end() + text[m.end()..].chars().next()?.len_utf8();
    }
}

fn token(index: usize) -> String {
    format!("{PLACEHOLDER_MARK}{index}{PLACEHOLDER_MARK}")
}

/// Per-call span table.
#[derive(Debug)]
pub(crate) struct Protector<'t> {
    tags: &'t SafeTags,
    spans: Vec<Span>,
}

impl<'t> Protector<'t> {
    pub(crate) fn new(tags: &'t SafeTags) -> Self {
        Protector { tags, spans: Vec::new() }
    }

    pub(crate) fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Replace every run of `PLACEHOLDER_MARK` with a reserved-origin token.
    pub(crate) fn escape_reserved(&mut self, text: &str) -> String {
        if !text.contains(PLACEHOLDER_MARK) {
            return text.to_string();
        }
        regex!(r"\x{10FFFD}+")
            .replace_all(text, |caps: &Captures<'_>| self.push(Origin::Reserved, &caps[0]))
            .into_owned()
    }

    pub(crate) fn restore_reserved(&self, text: &str) -> String {
        self.substitute(text, Select::Reserved)
    }

    /// Hide every group, calling `on_group` once after each group is hidden.
    pub(crate) fn hide(
        &mut self,
        mut text: String,
        html_likely: bool,
        mut on_group: impl FnMut(String, SafeGroup) -> String,
    ) -> String {
        for group in SafeGroup::ALL {
            let patterns = self.tags.patterns(group, html_likely);
            text = self.hide_group(&text, group, &patterns);
            text = on_group(text, group);
        }
        text
    }

    /// Show every group, calling `on_group` before each group's substitution.
    pub(crate) fn show(&self, mut text: String, mut on_group: impl FnMut(String, SafeGroup) -> String) -> String {
        for group in SafeGroup::ALL {
            text = on_group(text, group);
            text = self.substitute(&text, Select::Group(group));
        }
        text
    }

    fn push(&mut self, origin: Origin, original: &str) -> String {
        self.spans.push(Span { origin, original: original.to_string() });
        token(self.spans.len() - 1)
    }

    /// Left-to-right scan for the earliest match among `patterns`; ties go to
    /// the earlier pattern.
    fn hide_group(&mut self, text: &str, group: SafeGroup, patterns: &[&Regex]) -> String {
        if patterns.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        while pos < text.len() {
            let earliest = patterns
                .iter()
                .filter_map(|re| find_non_empty(re, text, pos))
                .fold(None, |best: Option<regex::Match<'_>>, m| match best {
                    Some(b) if b.start() <= m.start() => Some(b),
                    _ => Some(m),
                });

            let Some(m) = earliest else { break };
            out.push_str(&text[pos..m.start()]);
            let token = self.push(Origin::Group(group), m.as_str());
            out.push_str(&token);
            pos = m.end();
        }
        out.push_str(&text[pos..]);
        out
    }

    /// Replace tokens selected by `select` by their originals. Safe-group
    /// originals are expanded recursively; reserved tokens nested in them are
    /// kept.
    fn substitute(&self, text: &str, select: Select) -> String {
        if !text.contains(PLACEHOLDER_MARK) {
            return text.to_string();
        }
        regex!(r"\x{10FFFD}(\d+)\x{10FFFD}")
            .replace_all(text, |caps: &Captures<'_>| {
                match caps[1].parse::<usize>().ok().and_then(|i| self.spans.get(i)) {
                    Some(span) if select.matches(span.origin) => match span.origin {
                        Origin::Reserved => span.original.clone(),
                        Origin::Group(_) => self.substitute(&span.original, Select::AnyGroup),
                    },
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}
