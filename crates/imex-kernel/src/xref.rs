//! Cross-references and IMEx identifiers.

use crate::error::IdentifierError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Database name carried by every IMEx cross-reference.
pub const IMEX_DATABASE: &str = "imex";
/// Qualifier of the publication-level identifier.
pub const QUALIFIER_PRIMARY: &str = "imex-primary";
/// Qualifier of an identifier propagated onto evidence records.
pub const QUALIFIER_EVIDENCE: &str = "imex-evidence";

const IMEX_ID_PREFIX: &str = "IM-";

fn imex_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^IM-([0-9]+)$").expect("imex id regex must compile"))
}

/// A single IMEx identifier, `IM-<n>` with `n > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImexId(u64);

impl ImexId {
    pub fn new(value: u64) -> Result<Self, IdentifierError> {
        if value == 0 {
            return Err(IdentifierError::ImexIdOutOfRange(format!(
                "{IMEX_ID_PREFIX}{value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{IMEX_ID_PREFIX}{}", self.0)
    }
}

impl FromStr for ImexId {
    type Err = IdentifierError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let digits = imex_id_re()
            .captures(raw.trim())
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| IdentifierError::MalformedImexId(raw.to_string()))?;
        let value: u64 = digits
            .as_str()
            .parse()
            .map_err(|_| IdentifierError::ImexIdOutOfRange(raw.to_string()))?;
        Self::new(value).map_err(|_| IdentifierError::ImexIdOutOfRange(raw.to_string()))
    }
}

impl Serialize for ImexId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImexId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A cross-reference attached to a curation record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Xref {
    pub database: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub qualifier: String,
}

impl Xref {
    pub fn new(
        database: impl Into<String>,
        id: impl Into<String>,
        qualifier: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            id: id.into(),
            qualifier: qualifier.into(),
        }
    }

    /// Publication-level primary IMEx xref.
    pub fn imex_primary(id: ImexId) -> Self {
        Self::new(IMEX_DATABASE, id.to_string(), QUALIFIER_PRIMARY)
    }

    /// Evidence IMEx xref for an interaction or experiment.
    pub fn imex_evidence(id: ImexId) -> Self {
        Self::new(IMEX_DATABASE, id.to_string(), QUALIFIER_EVIDENCE)
    }

    pub fn is_imex(&self) -> bool {
        self.database.eq_ignore_ascii_case(IMEX_DATABASE)
    }

    pub fn is_imex_primary(&self) -> bool {
        self.is_imex() && self.qualifier == QUALIFIER_PRIMARY
    }

    pub fn is_imex_evidence(&self) -> bool {
        self.is_imex() && self.qualifier == QUALIFIER_EVIDENCE
    }
}

/// Whether an xref set carries an IMEx evidence identifier.
pub fn has_evidence_id(xrefs: &[Xref]) -> bool {
    xrefs.iter().any(Xref::is_imex_evidence)
}
