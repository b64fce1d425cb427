//! HTML entity decoding and re-encoding.
//!
//! Rules see literal characters only: entities are decoded after protection
//! and re-encoded, in the configured form, before the `html-entities` queue.
//! Decoding never produces a markup-significant character (`& < > " '`) or
//! the placeholder mark, so it cannot create markup or forge tokens.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Captures;
use serde::Deserialize;

use crate::PLACEHOLDER_MARK;

/// Entities that are restored by name, and which of them are invisible.
const ENTITIES: &[(&str, char, bool)] = &[
    ("nbsp", '\u{00A0}', true),
    ("thinsp", '\u{2009}', true),
    ("ensp", '\u{2002}', true),
    ("emsp", '\u{2003}', true),
    ("shy", '\u{00AD}', true),
    ("zwnj", '\u{200C}', true),
    ("zwj", '\u{200D}', true),
    ("lrm", '\u{200E}', true),
    ("rlm", '\u{200F}', true),
    ("laquo", '«', false),
    ("raquo", '»', false),
    ("lsaquo", '‹', false),
    ("rsaquo", '›', false),
    ("bdquo", '„', false),
    ("ldquo", '“', false),
    ("rdquo", '”', false),
    ("sbquo", '‚', false),
    ("lsquo", '‘', false),
    ("rsquo", '’', false),
    ("hellip", '…', false),
    ("mdash", '—', false),
    ("ndash", '–', false),
    ("minus", '−', false),
    ("copy", '©', false),
    ("reg", '®', false),
    ("trade", '™', false),
    ("deg", '°', false),
    ("times", '×', false),
    ("plusmn", '±', false),
    ("sect", '§', false),
    ("para", '¶', false),
    ("middot", '·', false),
    ("bull", '•', false),
    ("permil", '‰', false),
    ("prime", '′', false),
    ("Prime", '″', false),
    ("frac12", '½', false),
    ("frac14", '¼', false),
    ("frac34", '¾', false),
    ("larr", '←', false),
    ("rarr", '→', false),
    ("euro", '€', false),
    ("pound", '£', false),
    ("yen", '¥', false),
    ("cent", '¢', false),
    ("numero", '№', false),
];

static BY_NAME: Lazy<HashMap<&'static str, char>> = Lazy::new(|| ENTITIES.iter().map(|&(n, c, _)| (n, c)).collect());
static BY_CHAR: Lazy<HashMap<char, (&'static str, bool)>> =
    Lazy::new(|| ENTITIES.iter().map(|&(n, c, invisible)| (c, (n, invisible))).collect());

/// Output form of re-encoded entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Leave literal characters as they are.
    #[default]
    Default,
    /// `&nbsp;`
    Name,
    /// `&#160;`
    Digit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(default)]
pub struct HtmlEntityMode {
    pub kind: EntityKind,
    /// Only re-encode invisible characters (spaces, joiners, direction marks).
    pub only_invisible: bool,
}

/// Characters decoding must not produce: markup-significant ones, the
/// placeholder mark, and `\r`, which would survive as a bare line break after
/// line endings were normalized.
fn is_forbidden(c: char) -> bool {
    matches!(c, '&' | '<' | '>' | '"' | '\'' | '\0' | '\r' | PLACEHOLDER_MARK)
}

fn resolve(body: &str) -> Option<char> {
    let c = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        char::from_u32(u32::from_str_radix(hex, 16).ok()?)?
    } else if let Some(dec) = body.strip_prefix('#') {
        char::from_u32(dec.parse().ok()?)?
    } else {
        *BY_NAME.get(body)?
    };
    (!is_forbidden(c)).then_some(c)
}

/// Decode named and numeric entities. Unknown names and entities that would
/// produce markup-significant characters are left as they are.
pub fn decode(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    regex!(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]*);")
        .replace_all(text, |caps: &Captures<'_>| match resolve(&caps[1]) {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Re-encode table characters in the form `mode` asks for.
pub fn restore(text: &str, mode: &HtmlEntityMode) -> String {
    if mode.kind == EntityKind::Default {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match BY_CHAR.get(&c) {
            Some(&(name, invisible)) if invisible || !mode.only_invisible => match mode.kind {
                EntityKind::Name => {
                    out.push('&');
                    out.push_str(name);
                    out.push(';');
                }
                _ => out.push_str(&format!("&#{};", c as u32)),
            },
            _ => out.push(c),
        }
    }
    out
}
