//! Document scanning (input pre-classification).
//!
//! A single cheap pass over the input that records coarse traits. The traits
//! gate optional work later in the pipeline:
//!
//! - `TAG` / `MARKUP_DECL` / `ESCAPED_TAG`: the document is HTML-likely, so
//!   generic element tags get protected.
//! - `ENTITY`: entity decoding is worth running.
//! - `RESERVED`: the input already contains the placeholder code point and
//!   must be escaped before protection.
//!
//! This is a heuristic. False positives only cost a little extra work
//! (protecting something that looked like a tag).

use crate::PLACEHOLDER_MARK;

bitflags::bitflags! {
    /// Coarse traits of a document.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DocumentTraits: u8 {
        /// `<x` or `</x` with an ASCII letter.
        const TAG         = 1 << 0;
        /// `<!` (comment, doctype, CDATA).
        const MARKUP_DECL = 1 << 1;
        /// `&lt;` or `&gt;`.
        const ESCAPED_TAG = 1 << 2;
        /// Anything shaped like `&name;` or `&#123;`.
        const ENTITY      = 1 << 3;
        const RESERVED    = 1 << 4;
    }
}

impl DocumentTraits {
    pub fn scan(text: &str) -> Self {
        let mut traits = DocumentTraits::empty();

        if regex!(r"(?i)</?[a-z]").is_match(text) {
            traits |= DocumentTraits::TAG;
        }
        if text.contains("<!") {
            traits |= DocumentTraits::MARKUP_DECL;
        }
        if regex!(r"(?i)&[lg]t;").is_match(text) {
            traits |= DocumentTraits::ESCAPED_TAG;
        }
        if regex!(r"&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").is_match(text) {
            traits |= DocumentTraits::ENTITY;
        }
        if text.contains(PLACEHOLDER_MARK) {
            traits |= DocumentTraits::RESERVED;
        }

        traits
    }

    /// Whether generic `<tag>` protection should be attempted.
    pub fn is_html_likely(self) -> bool {
        self.intersects(DocumentTraits::TAG | DocumentTraits::MARKUP_DECL | DocumentTraits::ESCAPED_TAG)
    }
}
