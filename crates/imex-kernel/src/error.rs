//! Error types for identifier and reference parsing.

/// Errors raised while parsing identifiers and external references.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// Not of the form `IM-<digits>`.
    #[error("malformed IMEx identifier: {0:?}")]
    MalformedImexId(String),

    /// The numeric part is zero or does not fit the identifier space.
    #[error("IMEx identifier out of range: {0:?}")]
    ImexIdOutOfRange(String),

    /// No recognizable bibliographic reference.
    #[error("unrecognized external reference: {0:?}")]
    UnrecognizedReference(String),

    /// A recognized scheme with an invalid value (e.g. `PMID:0`).
    #[error("invalid {scheme} reference: {value:?}")]
    InvalidReference { scheme: &'static str, value: String },
}
