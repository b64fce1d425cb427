use regex::Captures;

use crate::rules::QUOTE_RULE;
use crate::rules::helpers::{replace_followed_by, replace_preceded_by};
use crate::{InnerRuleDef, PLACEHOLDER_MARK, Queue, QuoteTable, RuleContext, RuleDef};

pub fn rule_number_comma() -> RuleDef {
    rule! { name: "ru/number/comma", handler: number_comma }
}

/// `12.5%` → `12,5%` (also `‰ ° × x`, with optional spaces before the unit).
fn number_comma(text: &str, _: &RuleContext<'_>) -> String {
    regex!(r"(?m)(^|\s)(\d+)\.(\d+[\x{A0}\x{2009}\x{202F} ]*?[%‰°×x])").replace_all(text, "$1$2,$3").into_owned()
}

pub fn rule_number_ordinals() -> RuleDef {
    rule! { name: "ru/number/ordinals", handler: number_ordinals }
}

fn short_suffix(suffix: &str) -> &'static str {
    match suffix {
        "ый" | "ой" => "й",
        "ая" => "я",
        "ое" | "ые" => "е",
        "ым" | "ом" => "м",
        "ых" => "х",
        "ого" => "го",
        "ому" => "му",
        "ыми" => "ми",
        _ => "",
    }
}

/// `5-ый` → `5-й`, `10-ого` → `10-го`.
fn number_ordinals(text: &str, _: &RuleContext<'_>) -> String {
    // Three-letter suffixes first: `ыми` must win over `ым`.
    replace_followed_by(
        regex!(r"(\d[%‰]?)-(ого|ому|ыми|ый|ой|ая|ое|ые|ым|ом|ых)"),
        text,
        |_, rest| !rest.chars().next().is_some_and(char::is_alphabetic),
        |caps| format!("{}-{}", &caps[1], short_suffix(&caps[2])),
    )
}

pub fn rule_optalign_quote() -> RuleDef {
    rule! { name: "ru/optalign/quote", disabled: true, handler: optalign_quote }
}

/// Wrap opening quotes in hanging-punctuation spans.
fn optalign_quote(text: &str, ctx: &RuleContext<'_>) -> String {
    let Some(table) = ctx.setting_of(QUOTE_RULE, "ru").and_then(QuoteTable::from_settings) else {
        return text.to_string();
    };
    let openers = [table.left(0), table.left(1)];
    let is_opener = |s: &str| s.chars().next().is_some_and(|c| openers.contains(&Some(c)));
    if !text.chars().any(|c| openers.contains(&Some(c))) {
        return text.to_string();
    }

    let text = regex!(r"(^|\n\n|\x{10FFFD})(\S)").replace_all(text, |caps: &Captures<'_>| {
        if is_opener(&caps[2]) {
            format!(r#"{}<span class="optalign-n-lquote">{}</span>"#, &caps[1], &caps[2])
        } else {
            caps[0].to_string()
        }
    });
    replace_preceded_by(
        regex!(r"([ \x{A0}\n])(\S)"),
        &text,
        |caps, before| {
            is_opener(&caps[2]) && before.chars().next_back().is_some_and(|c| c != '\n' && c != PLACEHOLDER_MARK)
        },
        |caps| {
            let (space, quote) = (&caps[1], &caps[2]);
            format!(r#"<span class="optalign-sp-lquote">{space}</span><span class="optalign-lquote">{quote}</span>"#)
        },
    )
}

fn strip_optalign(text: &str) -> String {
    if !text.contains("optalign-") {
        return text.to_string();
    }
    regex!(r#"(?s)<span class="optalign-(?:n-|sp-)?lquote">(.*?)</span>"#).replace_all(text, "$1").into_owned()
}

/// Drops spans left by an earlier run so the rule can be re-applied.
fn strip_optalign_spans(text: &str, _: &RuleContext<'_>) -> String {
    strip_optalign(text)
}

/// Titles are plain text in browsers; spans would show up verbatim.
fn strip_optalign_in_title(text: &str, _: &RuleContext<'_>) -> String {
    if !text.contains("optalign-") {
        return text.to_string();
    }
    regex!(r"(?is)(<title[^>]*>)(.*?)(</title>)")
        .replace_all(text, |caps: &Captures<'_>| format!("{}{}{}", &caps[1], strip_optalign(&caps[2]), &caps[3]))
        .into_owned()
}

pub fn get() -> Vec<RuleDef> {
    vec![rule_number_comma(), rule_number_ordinals(), rule_optalign_quote()]
}

pub fn inner() -> Vec<InnerRuleDef> {
    vec![
        inner_rule! { name: "ru/optalign/quote", queue: Queue::Start, handler: strip_optalign_spans },
        inner_rule! { name: "ru/optalign/quote", queue: Queue::End, handler: strip_optalign_in_title },
    ]
}
