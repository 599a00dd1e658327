//! External bibliographic references (PubMed, DOI).
//!
//! Only a publication with a recognizable external reference can be
//! registered automatically; the registry keys its records by the canonical
//! rendering produced here.

use crate::error::IdentifierError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn pubmed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{1,12}$").expect("pubmed regex must compile"))
}

fn doi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^10\.[0-9]{4,9}/\S+$").expect("doi regex must compile"))
}

/// A well-formed external reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternalRef {
    Pubmed(u64),
    Doi(String),
}

impl ExternalRef {
    pub fn scheme(&self) -> &'static str {
        match self {
            ExternalRef::Pubmed(_) => "pubmed",
            ExternalRef::Doi(_) => "doi",
        }
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalRef::Pubmed(id) => write!(f, "PMID:{id}"),
            ExternalRef::Doi(doi) => write!(f, "DOI:{doi}"),
        }
    }
}

impl FromStr for ExternalRef {
    type Err = IdentifierError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (scheme, value) = match trimmed.split_once(':') {
            Some((scheme, value)) => (Some(scheme.trim().to_ascii_lowercase()), value.trim()),
            None => (None, trimmed),
        };

        match scheme.as_deref() {
            Some("pmid") | Some("pubmed") => parse_pubmed(value),
            Some("doi") => parse_doi(value),
            Some(_) => Err(IdentifierError::UnrecognizedReference(raw.to_string())),
            None if pubmed_re().is_match(value) => parse_pubmed(value),
            None if doi_re().is_match(value) => parse_doi(value),
            None => Err(IdentifierError::UnrecognizedReference(raw.to_string())),
        }
    }
}

fn parse_pubmed(value: &str) -> Result<ExternalRef, IdentifierError> {
    let invalid = || IdentifierError::InvalidReference {
        scheme: "pubmed",
        value: value.to_string(),
    };
    if !pubmed_re().is_match(value) {
        return Err(invalid());
    }
    match value.parse::<u64>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(id) => Ok(ExternalRef::Pubmed(id)),
    }
}

fn parse_doi(value: &str) -> Result<ExternalRef, IdentifierError> {
    if doi_re().is_match(value) {
        Ok(ExternalRef::Doi(value.to_string()))
    } else {
        Err(IdentifierError::InvalidReference {
            scheme: "doi",
            value: value.to_string(),
        })
    }
}
