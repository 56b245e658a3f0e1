use thiserror::Error;

/// Why a string was not accepted as an identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("identifier is empty")]
    Empty,

    /// Names are taken verbatim, so padding is almost always a bug upstream.
    #[error("{kind} has surrounding whitespace: '{actual}'")]
    Untrimmed { kind: &'static str, actual: String },

    #[error("expected '{expected}_' prefix, found '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    #[error("generated id has no '_' separator")]
    MissingSeparator,

    #[error("malformed ULID: {0}")]
    InvalidUlid(String),
}

impl IdError {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}
