use regex::Captures;
use serde_json::json;

use crate::rules::helpers::{at_line_end, followed_by_end_or_capital, is_terminal_punctuation, replace_followed_by};
use crate::{LiveAffinity, Queue, RuleContext, RuleDef, normalize_quotes};

const NBSP: char = '\u{00A0}';

pub fn rule_quote() -> RuleDef {
    rule! {
        name: "common/punctuation/quote",
        settings: json!({
            "ru": {"left": "«„‚", "right": "»“‘", "collapse_duplicates": true},
            "en": {"left": "“‘", "right": "”’"}
        }),
        handler: quote
    }
}

/// No-op for locales without a quote table.
fn quote(text: &str, ctx: &RuleContext<'_>) -> String {
    match ctx.quote_table() {
        Some(table) => normalize_quotes(text, &table),
        None => text.to_string(),
    }
}

/// `<a …>«x»</a>` → `«<a …>x</a>»`. Runs in `end` so the link tags are
/// visible again.
pub fn rule_quote_link() -> RuleDef {
    rule! { name: "common/punctuation/quoteLink", queue: Queue::End, handler: quote_link }
}

fn quote_link(text: &str, ctx: &RuleContext<'_>) -> String {
    let Some(table) = ctx.quote_table() else { return text.to_string() };
    let (Some(left), Some(right)) = (table.left(0), table.right(0)) else { return text.to_string() };
    if !text.contains(left) {
        return text.to_string();
    }

    regex!(r"(?is)(<a\s[^>]*?>)(.*?)(</a>)")
        .replace_all(text, |caps: &Captures<'_>| {
            let inner = caps[2].strip_prefix(left).and_then(|rest| rest.strip_suffix(right));
            match inner {
                Some(inner) => format!("{left}{}{inner}{}{right}", &caps[1], &caps[3]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub fn rule_apostrophe() -> RuleDef {
    rule! { name: "common/punctuation/apostrophe", handler: apostrophe }
}

/// `'` between two letters becomes `’`.
fn apostrophe(text: &str, _: &RuleContext<'_>) -> String {
    if !text.contains('\'') {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let between_letters = i > 0
                && chars[i - 1].is_alphabetic()
                && chars.get(i + 1).is_some_and(|n| n.is_alphabetic());
            if c == '\'' && between_letters { '’' } else { c }
        })
        .collect()
}

pub fn rule_before_bracket() -> RuleDef {
    rule! { name: "common/space/beforeBracket", handler: before_bracket }
}

fn before_bracket(text: &str, _: &RuleContext<'_>) -> String {
    regex!(r"([\p{L}.!?,;…)])\(").replace_all(text, "$1 (").into_owned()
}

pub fn rule_del_repeat_space() -> RuleDef {
    rule! { name: "common/space/delRepeatSpace", handler: del_repeat_space }
}

/// Runs of spaces and tabs after a visible character collapse to one space,
/// unless the run ends the line.
fn del_repeat_space(text: &str, _: &RuleContext<'_>) -> String {
    replace_followed_by(
        regex!(r"([^\s])[ \t]{2,}"),
        text,
        |_, rest| !rest.starts_with('\n'),
        |caps: &Captures<'_>| format!("{} ", &caps[1]),
    )
}

pub fn rule_after_number() -> RuleDef {
    rule! { name: "common/nbsp/afterNumber", disabled: true, handler: after_number }
}

fn after_number(text: &str, _: &RuleContext<'_>) -> String {
    regex!(r"(^|\D)(\d{1,5}) (\p{L}{2,})").replace_all(text, "${1}${2}\u{00A0}${3}").into_owned()
}

pub fn rule_before_short_last_word() -> RuleDef {
    rule! {
        name: "common/nbsp/beforeShortLastWord",
        settings: json!({"length_last_word": 3}),
        handler: before_short_last_word
    }
}

fn before_short_last_word(text: &str, ctx: &RuleContext<'_>) -> String {
    let max = ctx.usize_setting("length_last_word").unwrap_or(3);
    if max == 0 {
        return text.to_string();
    }
    replace_followed_by(
        regex!(r"([\p{Ll}\d]) (\p{L}+)([.!?…])"),
        text,
        |caps, rest| caps[2].chars().count() <= max && followed_by_end_or_capital(rest),
        |caps| format!("{}{NBSP}{}{}", &caps[1], &caps[2], &caps[3]),
    )
}

pub fn rule_before_short_last_number() -> RuleDef {
    rule! {
        name: "common/nbsp/beforeShortLastNumber",
        live: LiveAffinity::RequiredNotLive,
        settings: json!({"length_last_number": 2}),
        handler: before_short_last_number
    }
}

fn before_short_last_number(text: &str, ctx: &RuleContext<'_>) -> String {
    let max = ctx.usize_setting("length_last_number").unwrap_or(2);
    if max == 0 {
        return text.to_string();
    }
    let right_quote = ctx.quote_table().and_then(|t| t.right(0));

    replace_followed_by(
        regex!(r"(\p{L}) (\d+)"),
        text,
        |caps, rest| caps[2].chars().count() <= max && ends_after_number(rest, right_quote),
        |caps| format!("{}{NBSP}{}", &caps[1], &caps[2]),
    )
}

/// Optional sign or closing quote, then the end of the line or a sentence end.
fn ends_after_number(rest: &str, right_quote: Option<char>) -> bool {
    let mut rest = rest;
    if let Some(c) = rest.chars().next() {
        if "-+−%'\"".contains(c) || Some(c) == right_quote {
            rest = &rest[c.len_utf8()..];
        }
    }
    if at_line_end(rest) {
        return true;
    }

    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if is_terminal_punctuation(c) => {
            let after = chars.as_str();
            at_line_end(after) || followed_by_end_or_capital(after)
        }
        _ => false,
    }
}

pub fn get() -> Vec<RuleDef> {
    vec![
        rule_quote(),
        rule_quote_link(),
        rule_apostrophe(),
        rule_before_bracket(),
        rule_del_repeat_space(),
        rule_after_number(),
        rule_before_short_last_word(),
        rule_before_short_last_number(),
    ]
}
