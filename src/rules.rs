//! Shipped rule catalog.
//!
//! Each locale module exposes `rules::get()` (main rules) and, where it has
//! any, `rules::inner()` (inner rules). `registry()` collects them into the
//! registry behind `Typographer::new`.

pub(crate) mod common;
pub(crate) mod helpers;
pub(crate) mod ru;

use crate::{Result, RuleRegistry};

/// Rule whose settings hold the per-locale quote tables.
pub(crate) const QUOTE_RULE: &str = "common/punctuation/quote";

pub(crate) fn registry() -> Result<RuleRegistry> {
    // `en` has quote settings but no rules of its own yet.
    let mut registry = RuleRegistry::new().with_locale("en");
    for def in common::rules::get().into_iter().chain(ru::rules::get()) {
        registry.register(def)?;
    }
    for def in ru::rules::inner() {
        registry.register_inner(def)?;
    }
    Ok(registry)
}
