//! Error kinds surfaced by the lineage engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineageError {
    /// A referenced table, column or entity is absent from the catalog.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A required caller-supplied field is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A lineage key could not be decoded into a year/month.
    #[error("invalid lineage key {key:?}: {reason}")]
    Parse { key: String, reason: String },

    /// The lineage graph has zero or several sink candidates.
    #[error("lineage graph has no unique head (candidates: {candidates:?})")]
    AmbiguousGraph { candidates: Vec<String> },

    /// The catalog collaborator rejected a request.
    #[error("catalog request failed: {0}")]
    Catalog(String),

    #[error("failed to encode entity attributes: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LineageError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn parse(key: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LineageError>;
