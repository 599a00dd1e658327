//! Publication identifier resolution.
//!
//! Classification is recomputed from the publication's current xrefs on
//! every pass. Nothing here is cached: curators may have edited the record
//! since it was last seen.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::record::Publication;
use crate::xref::Xref;

/// Identifier state of one publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationState {
    /// No IMEx xref at all.
    None,
    /// A locally scoped evidence identifier but no primary one.
    EvidenceOnly,
    /// Exactly one primary IMEx identifier.
    PrimaryAssigned,
    /// Two or more distinct primary identifiers.
    Conflicted,
}

impl PublicationState {
    pub fn as_str(self) -> &'static str {
        match self {
            PublicationState::None => "NONE",
            PublicationState::EvidenceOnly => "EVIDENCE_ONLY",
            PublicationState::PrimaryAssigned => "PRIMARY_ASSIGNED",
            PublicationState::Conflicted => "CONFLICTED",
        }
    }

    /// States from which a new primary identifier may be attached.
    pub fn awaits_primary(self) -> bool {
        matches!(self, PublicationState::None | PublicationState::EvidenceOnly)
    }
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a publication's xrefs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub state: PublicationState,
    /// Distinct primary values, sorted. More than one means `Conflicted`.
    pub primary_ids: Vec<String>,
    /// Distinct evidence values on the publication itself, sorted.
    pub evidence_ids: Vec<String>,
}

impl Classification {
    /// The single primary identifier, when one is assigned.
    pub fn existing_id(&self) -> Option<&str> {
        match self.state {
            PublicationState::PrimaryAssigned => self.primary_ids.first().map(String::as_str),
            _ => None,
        }
    }
}

/// Classify a publication from its current cross-references.
pub fn classify(publication: &Publication) -> Classification {
    classify_xrefs(&publication.xrefs)
}

/// Classify a raw xref set.
pub fn classify_xrefs(xrefs: &[Xref]) -> Classification {
    let primary: BTreeSet<&str> = xrefs
        .iter()
        .filter(|x| x.is_imex_primary())
        .map(|x| x.id.trim())
        .collect();
    let evidence: BTreeSet<&str> = xrefs
        .iter()
        .filter(|x| x.is_imex() && !x.is_imex_primary())
        .map(|x| x.id.trim())
        .collect();

    let state = match (primary.len(), evidence.is_empty()) {
        (0, true) => PublicationState::None,
        (0, false) => PublicationState::EvidenceOnly,
        (1, _) => PublicationState::PrimaryAssigned,
        _ => PublicationState::Conflicted,
    };

    Classification {
        state,
        primary_ids: primary.into_iter().map(str::to_string).collect(),
        evidence_ids: evidence.into_iter().map(str::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::{IMEX_DATABASE, ImexId, QUALIFIER_PRIMARY};

    fn id(value: u64) -> ImexId {
        ImexId::new(value).expect("non-zero id")
    }

    #[test]
    fn no_xrefs_is_none() {
        let c = classify(&Publication::new("EBI-1"));
        assert_eq!(c.state, PublicationState::None);
        assert_eq!(c.existing_id(), None);
    }

    #[test]
    fn foreign_xrefs_do_not_count() {
        let publication =
            Publication::new("EBI-1").with_xref(Xref::new("pubmed", "123", "primary-reference"));
        assert_eq!(classify(&publication).state, PublicationState::None);
    }

    #[test]
    fn evidence_marker_without_primary() {
        let publication = Publication::new("EBI-1").with_xref(Xref::imex_evidence(id(5)));
        let c = classify(&publication);
        assert_eq!(c.state, PublicationState::EvidenceOnly);
        assert_eq!(c.evidence_ids, vec!["IM-5".to_string()]);
    }

    #[test]
    fn single_primary_is_assigned() {
        let publication = Publication::new("EBI-1")
            .with_xref(Xref::imex_primary(id(2000)))
            .with_xref(Xref::imex_evidence(id(2000)));
        let c = classify(&publication);
        assert_eq!(c.state, PublicationState::PrimaryAssigned);
        assert_eq!(c.existing_id(), Some("IM-2000"));
    }

    #[test]
    fn repeated_identical_primary_collapses() {
        let publication = Publication::new("EBI-1")
            .with_xref(Xref::imex_primary(id(3)))
            .with_xref(Xref::new(IMEX_DATABASE, " IM-3", QUALIFIER_PRIMARY));
        assert_eq!(classify(&publication).state, PublicationState::PrimaryAssigned);
    }

    #[test]
    fn distinct_primaries_are_conflicted_and_all_reported() {
        let publication = Publication::new("EBI-1")
            .with_xref(Xref::imex_primary(id(9)))
            .with_xref(Xref::imex_primary(id(10)));
        let c = classify(&publication);
        assert_eq!(c.state, PublicationState::Conflicted);
        assert_eq!(c.primary_ids, vec!["IM-10".to_string(), "IM-9".to_string()]);
        assert_eq!(c.existing_id(), None);
    }
}
