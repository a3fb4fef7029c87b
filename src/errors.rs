use thiserror::Error;

/// Errors raised while building or evaluating flags.
///
/// An unconfigured flag or an unregistered rule is never an error: both
/// evaluate to `false`.
#[derive(Debug, Error)]
pub enum FlagError {
    /// Structurally invalid rule tree, caught when the configuration is built.
    #[error("invalid configuration for flag `{flag}` at {path}: {message}")]
    Config {
        flag: String,
        path: String,
        message: String,
    },

    #[error("invalid context: {0}")]
    InvalidContext(String),

    /// `or`, `and` and `not` are combinators and cannot be registered.
    #[error("rule name `{0}` is reserved for a combinator")]
    ReservedRule(String),

    /// Raised by a rule function; passed through to the caller untouched.
    #[error("rule `{rule}` failed: {message}")]
    Rule { rule: String, message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlagError {
    pub fn rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        FlagError::Rule {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlagError>;
