//! Quote-nesting normalizer.
//!
//! Converts straight double quotes (and already-placed locale glyphs) into
//! correctly nested locale glyphs. The pass works on a flat list of pieces
//! rather than on regex substitutions so each decision can look at both
//! neighbours of a mark:
//!
//! ```text
//! text ──shield──> pieces ──tag──> Open/Close marks ──depth──> glyphs ──collapse──> text
//!        (a"b)              (ws/letter/token rules)   (level -1..max)   («« → «)
//!                                        ^                                       │
//!                                        └──────────── until unchanged ──────────┘
//! ```
//!
//! The result is a fixed point: feeding the output back in reproduces it.
//! A single pass already is one unless it collapsed glyphs or placed glyphs
//! outside the mark set (deeper levels such as `‘’`); both change the mark
//! count the next pass sees, so passes repeat until the text settles. Every
//! unsettled pass removes at least one mark, which bounds the loop.

use serde_json::Value;

use crate::PLACEHOLDER_MARK;

/// Quote glyphs that are always treated as quote marks, whatever the locale.
const QUOTE_MARKS: &str = "«‹»›„“‟”\"";

/// Per-locale quote glyphs, indexed by nesting depth (0 is outermost).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteTable {
    levels: Vec<(char, char)>,
    collapse_duplicates: bool,
}

impl QuoteTable {
    pub fn new(levels: Vec<(char, char)>) -> Self {
        QuoteTable { levels, collapse_duplicates: false }
    }

    pub fn with_collapse(mut self, collapse: bool) -> Self {
        self.collapse_duplicates = collapse;
        self
    }

    /// Read a table from a locale settings object:
    /// `{"left": "«„", "right": "»“", "collapse_duplicates": true}`.
    ///
    /// Returns `None` when the object is missing either side or the sides
    /// differ in length.
    pub fn from_settings(value: &Value) -> Option<Self> {
        let left: Vec<char> = value.get("left")?.as_str()?.chars().collect();
        let right: Vec<char> = value.get("right")?.as_str()?.chars().collect();
        if left.is_empty() || left.len() != right.len() {
            return None;
        }
        let collapse = value.get("collapse_duplicates").and_then(Value::as_bool).unwrap_or(false);
        Some(QuoteTable::new(left.into_iter().zip(right).collect()).with_collapse(collapse))
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn left(&self, level: usize) -> Option<char> {
        self.levels.get(level).map(|(l, _)| *l)
    }

    pub fn right(&self, level: usize) -> Option<char> {
        self.levels.get(level).map(|(_, r)| *r)
    }

    fn is_mark(&self, c: char) -> bool {
        QUOTE_MARKS.contains(c) || self.levels.first().is_some_and(|&(l, r)| c == l || c == r)
    }

    /// A left glyph of some level that is no level's right glyph. Such a glyph
    /// was placed as an opener and keeps that direction when read back.
    fn is_placed_opener(&self, c: char) -> bool {
        self.levels.iter().any(|&(l, _)| l == c) && !self.levels.iter().any(|&(_, r)| r == c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy)]
enum Piece {
    Text(char),
    /// Mid-word quote mark kept verbatim.
    Shielded(char),
    Mark(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Out {
    Plain(char),
    Glyph(char),
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric()
}

fn opens_before(c: char) -> bool {
    c.is_alphanumeric() || c == '\u{0301}'
}

/// Normalize quotes in `text` according to `table`.
///
/// Never panics; unbalanced input degrades to depth-0 glyphs.
pub fn normalize_quotes(text: &str, table: &QuoteTable) -> String {
    if table.depth() == 0 {
        return text.to_string();
    }

    let rounds = text.chars().filter(|&c| table.is_mark(c)).count() + 2;
    let mut current = normalize_pass(text, table);
    for _ in 0..rounds {
        let next = normalize_pass(&current, table);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn normalize_pass(text: &str, table: &QuoteTable) -> String {
    let chars: Vec<char> = text.chars().collect();
    let (pieces, count) = tag_marks(&chars, table);

    let nested = table.depth() > 1 && count % 2 == 0;
    let mut out = if nested { assign_depths(&pieces, table) } else { flat_glyphs(&pieces, table) };

    // Doubled glyphs only come from directly nested quotes.
    if nested && table.collapse_duplicates && table.levels[0] == table.levels[1] {
        let (left, right) = table.levels[0];
        collapse_doubled(&mut out, left);
        collapse_doubled(&mut out, right);
    }

    out.into_iter()
        .map(|o| match o {
            Out::Plain(c) | Out::Glyph(c) => c,
        })
        .collect()
}

/// Shield mid-word marks, collapse the rest to markers and decide their
/// direction. Returns the pieces and the number of markers.
fn tag_marks(chars: &[char], table: &QuoteTable) -> (Vec<Piece>, usize) {
    let mut pieces = Vec::with_capacity(chars.len());
    let mut count = 0;
    let mut line_blank = true;

    for (i, &c) in chars.iter().enumerate() {
        if !table.is_mark(c) {
            pieces.push(Piece::Text(c));
            if c == '\n' {
                line_blank = true;
            } else if !c.is_whitespace() {
                line_blank = false;
            }
            continue;
        }

        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();

        if prev.is_some_and(is_word) && next.is_some_and(is_word) {
            pieces.push(Piece::Shielded(c));
            line_blank = false;
            continue;
        }

        count += 1;
        let prev_blank = prev.is_none_or(char::is_whitespace);
        // Everything else closes, including a marker glued to the end of a
        // placeholder token.
        let opening = line_blank
            || next.is_some_and(opens_before)
            || (next == Some(PLACEHOLDER_MARK) && prev_blank)
            || table.is_placed_opener(c);
        let direction = if opening { Direction::Open } else { Direction::Close };

        pieces.push(Piece::Mark(direction));
        line_blank = false;
    }

    (pieces, count)
}

fn flat_glyphs(pieces: &[Piece], table: &QuoteTable) -> Vec<Out> {
    let (left, right) = table.levels[0];
    pieces
        .iter()
        .map(|p| match *p {
            Piece::Text(c) | Piece::Shielded(c) => Out::Plain(c),
            Piece::Mark(Direction::Open) => Out::Glyph(left),
            Piece::Mark(Direction::Close) => Out::Glyph(right),
        })
        .collect()
}

/// Walk the markers keeping a nesting level between -1 (outside any quote)
/// and `depth - 1`.
///
/// ```text
/// "a "b" c"     level: -1 →0 →1 →0 →-1
///               glyph:   «  „  “  »
/// ```
///
/// A closer with nothing open becomes a depth-0 opener, so unbalanced input
/// always makes progress.
fn assign_depths(pieces: &[Piece], table: &QuoteTable) -> Vec<Out> {
    const FLOOR: isize = -1;
    let max = table.depth() as isize - 1;
    let mut level = FLOOR;
    let mut out = Vec::with_capacity(pieces.len());

    for piece in pieces {
        match *piece {
            Piece::Text(c) => out.push(Out::Plain(c)),
            Piece::Shielded(c) => {
                level = FLOOR;
                out.push(Out::Plain(c));
            }
            Piece::Mark(Direction::Open) => {
                level = (level + 1).min(max);
                out.push(Out::Glyph(table.levels[level as usize].0));
            }
            Piece::Mark(Direction::Close) => {
                if level <= FLOOR {
                    level = 0;
                    out.push(Out::Glyph(table.levels[0].0));
                } else {
                    out.push(Out::Glyph(table.levels[level as usize].1));
                    level = (level - 1).max(FLOOR);
                }
            }
        }
    }

    out
}

/// `««` → `«` (non-overlapping, left to right), only between placed glyphs.
fn collapse_doubled(out: &mut Vec<Out>, glyph: char) {
    let mut result = Vec::with_capacity(out.len());
    let mut i = 0;
    while i < out.len() {
        result.push(out[i]);
        if out[i] == Out::Glyph(glyph) && out.get(i + 1) == Some(&Out::Glyph(glyph)) {
            i += 2;
        } else {
            i += 1;
        }
    }
    *out = result;
}
