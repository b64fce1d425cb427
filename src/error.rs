//! Error type shared by registration, configuration and protection setup.
//!
//! `execute()` itself has no error path: handlers are total functions over
//! strings. Everything that can be malformed is rejected when it is declared.

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Rule name is not of the form `<locale>/<group>/<id>`.
    #[error("invalid rule name '{0}' (expected <locale>/<group>/<id>)")]
    InvalidRuleName(String),

    /// Rule group has no base index.
    #[error("unknown rule group '{group}' in rule '{rule}'")]
    UnknownGroup { rule: String, group: String },

    #[error("unknown queue '{0}'")]
    UnknownQueue(String),

    #[error("invalid rule index '{0}'")]
    InvalidIndex(String),

    /// Engine configured for a locale no registered rule belongs to.
    #[error("unknown locale '{0}'")]
    UnknownLocale(String),

    /// Protected tag has the wrong shape (empty delimiters, empty matches).
    #[error("invalid protected tag: {0}")]
    InvalidProtectedTag(String),

    #[error("invalid pattern")]
    Pattern(#[from] regex::Error),
}
