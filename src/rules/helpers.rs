use regex::{Captures, Regex};

/// `Regex::replace_all` with a condition on the text that follows each match.
///
/// Stands in for a lookahead: `accept` sees the match and the rest of the
/// input after it, and rejected matches are copied through unchanged. The
/// checked text is never consumed, so adjacent candidates are all considered.
pub fn replace_followed_by(
    re: &Regex,
    text: &str,
    accept: impl Fn(&Captures<'_>, &str) -> bool,
    replace: impl Fn(&Captures<'_>) -> String,
) -> String {
    replace_where(re, text, |caps, _, after| accept(caps, after), replace)
}

/// Like [`replace_followed_by`], but `accept` sees the input before the match
/// (a lookbehind).
pub fn replace_preceded_by(
    re: &Regex,
    text: &str,
    accept: impl Fn(&Captures<'_>, &str) -> bool,
    replace: impl Fn(&Captures<'_>) -> String,
) -> String {
    replace_where(re, text, |caps, before, _| accept(caps, before), replace)
}

fn replace_where(
    re: &Regex,
    text: &str,
    accept: impl Fn(&Captures<'_>, &str, &str) -> bool,
    replace: impl Fn(&Captures<'_>) -> String,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        if !accept(&caps, &text[..m.start()], &text[m.end()..]) {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&replace(&caps));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Sentence end for "last word" rules: end of input, or a space followed by
/// an uppercase letter.
pub fn followed_by_end_or_capital(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(' ') => chars.next().is_some_and(char::is_uppercase),
        Some(_) => false,
    }
}

/// End of input or end of line.
pub fn at_line_end(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with('\n')
}

pub fn is_terminal_punctuation(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_matches_are_kept() {
        let re = regex!(r"(\d)x");
        let out = replace_followed_by(re, "1x 2xa 3x", |_, rest| !rest.starts_with('a'), |c| format!("{}y", &c[1]));
        assert_eq!(out, "1y 2xa 3y");
    }

    #[test]
    fn lookbehind_sees_the_original_text() {
        let re = regex!(r" (\d)");
        let out = replace_preceded_by(re, "a 1 2 b 3", |_, before| before.ends_with(char::is_alphabetic), |c| {
            format!("_{}", &c[1])
        });
        assert_eq!(out, "a_1 2 b_3");
    }

    #[test]
    fn boundaries() {
        assert!(followed_by_end_or_capital(""));
        assert!(followed_by_end_or_capital(" Next"));
        assert!(!followed_by_end_or_capital(" next"));
        assert!(!followed_by_end_or_capital("x"));
        assert!(at_line_end("\nmore"));
        assert!(!at_line_end(" "));
    }
}
