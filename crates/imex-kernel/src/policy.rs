//! Conflict and eligibility policy.
//!
//! Pure decision logic. The coordinator threads the returned decision
//! through its own control flow; nothing here mutates state or flags.

use serde::{Deserialize, Serialize};

use crate::record::Publication;
use crate::resolver::{Classification, PublicationState};
use crate::xref::ImexId;

/// What the registry knows about one external reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRecord {
    pub external_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imex_id: Option<ImexId>,
    pub owner: String,
}

/// Registry answer as seen by the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryView {
    /// No lookup was made (no usable reference, or the state made it moot).
    NotConsulted,
    Unregistered,
    Registered(RegistryRecord),
}

/// Decision for one publication in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum EligibilityDecision {
    /// Allocate a fresh identifier.
    Proceed,
    /// Attach the identifier the registry already holds for this reference.
    AdoptRegistered { imex_id: ImexId },
    /// Primary already present and consistent; only propagation may run.
    SkipUpToDate { imex_id: ImexId },
    /// Needs a data repair by a curator.
    RejectConflict { reason: String },
    /// Needs manual registration by a curator.
    RejectIneligible { reason: String },
    /// Claimed by another institution; terminal for this pass.
    RejectForeign {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        imex_id: Option<ImexId>,
        owner: String,
    },
}

impl EligibilityDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            EligibilityDecision::Proceed => "proceed",
            EligibilityDecision::AdoptRegistered { .. } => "adopt_registered",
            EligibilityDecision::SkipUpToDate { .. } => "skip_up_to_date",
            EligibilityDecision::RejectConflict { .. } => "reject_conflict",
            EligibilityDecision::RejectIneligible { .. } => "reject_ineligible",
            EligibilityDecision::RejectForeign { .. } => "reject_foreign",
        }
    }
}

/// Whether a registry lookup can change the decision for this publication.
pub fn requires_registry(publication: &Publication, classification: &Classification) -> bool {
    classification.state != PublicationState::Conflicted
        && publication.parsed_external_ref().is_ok()
}

/// Decide what may happen to `publication` in this pass.
pub fn evaluate(
    publication: &Publication,
    classification: &Classification,
    registry: &RegistryView,
    institution: &str,
) -> EligibilityDecision {
    if classification.state == PublicationState::Conflicted {
        return EligibilityDecision::RejectConflict {
            reason: format!(
                "multiple primary IMEx identifiers: {}",
                classification.primary_ids.join(", ")
            ),
        };
    }

    if let RegistryView::Registered(record) = registry
        && !record.owner.eq_ignore_ascii_case(institution)
    {
        return EligibilityDecision::RejectForeign {
            imex_id: record.imex_id,
            owner: record.owner.clone(),
        };
    }

    if !classification.state.awaits_primary() {
        return evaluate_assigned(classification, registry);
    }

    if let Err(err) = publication.parsed_external_ref() {
        let reason = match publication.external_ref.as_deref() {
            None | Some("") => "no external reference; register manually".to_string(),
            Some(_) => format!("{err}; register manually"),
        };
        return EligibilityDecision::RejectIneligible { reason };
    }

    match registry {
        RegistryView::Registered(RegistryRecord {
            imex_id: Some(imex_id),
            ..
        }) => EligibilityDecision::AdoptRegistered { imex_id: *imex_id },
        _ => EligibilityDecision::Proceed,
    }
}

fn evaluate_assigned(
    classification: &Classification,
    registry: &RegistryView,
) -> EligibilityDecision {
    let raw = classification.existing_id().unwrap_or_default();
    let local: ImexId = match raw.parse() {
        Ok(id) => id,
        Err(err) => {
            return EligibilityDecision::RejectConflict {
                reason: format!("primary identifier unusable: {err}"),
            };
        }
    };

    match registry {
        RegistryView::Registered(RegistryRecord {
            imex_id: Some(remote),
            ..
        }) if *remote != local => EligibilityDecision::RejectConflict {
            reason: format!("local primary {local} differs from registry {remote}"),
        },
        _ => EligibilityDecision::SkipUpToDate { imex_id: local },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::classify;
    use crate::xref::{IMEX_DATABASE, QUALIFIER_PRIMARY, Xref};

    const HOME: &str = "IntAct";

    fn id(value: u64) -> ImexId {
        ImexId::new(value).expect("non-zero id")
    }

    fn decide(publication: &Publication, registry: RegistryView) -> EligibilityDecision {
        evaluate(publication, &classify(publication), &registry, HOME)
    }

    fn record(imex_id: Option<u64>, owner: &str) -> RegistryView {
        RegistryView::Registered(RegistryRecord {
            external_ref: "PMID:123".to_string(),
            imex_id: imex_id.map(id),
            owner: owner.to_string(),
        })
    }

    #[test]
    fn fresh_publication_with_pubmed_proceeds() {
        let publication = Publication::new("P1").with_external_ref("PMID:123");
        assert_eq!(
            decide(&publication, RegistryView::Unregistered),
            EligibilityDecision::Proceed
        );
    }

    #[test]
    fn evidence_only_publication_proceeds() {
        let publication = Publication::new("P1")
            .with_external_ref("PMID:123")
            .with_xref(Xref::imex_evidence(id(4)));
        assert_eq!(
            decide(&publication, RegistryView::Unregistered),
            EligibilityDecision::Proceed
        );
    }

    #[test]
    fn missing_reference_is_ineligible_not_conflict() {
        let publication = Publication::new("P3");
        let decision = decide(&publication, RegistryView::NotConsulted);
        assert!(matches!(
            decision,
            EligibilityDecision::RejectIneligible { ref reason } if reason.contains("no external reference")
        ));

        let malformed = Publication::new("P3").with_external_ref("unassigned12");
        assert!(matches!(
            decide(&malformed, RegistryView::NotConsulted),
            EligibilityDecision::RejectIneligible { .. }
        ));
        assert!(!requires_registry(&malformed, &classify(&malformed)));
    }

    #[test]
    fn conflicting_primaries_are_rejected_even_without_reference() {
        let publication = Publication::new("P4")
            .with_xref(Xref::imex_primary(id(1)))
            .with_xref(Xref::imex_primary(id(2)));
        assert!(!requires_registry(&publication, &classify(&publication)));
        assert!(matches!(
            decide(&publication, RegistryView::NotConsulted),
            EligibilityDecision::RejectConflict { ref reason } if reason.contains("IM-1, IM-2")
        ));
    }

    #[test]
    fn assigned_publication_skips_when_registry_agrees_or_is_silent() {
        let publication = Publication::new("P2")
            .with_external_ref("PMID:123")
            .with_xref(Xref::imex_primary(id(2000)));
        let expected = EligibilityDecision::SkipUpToDate { imex_id: id(2000) };
        assert_eq!(decide(&publication, RegistryView::NotConsulted), expected);
        assert_eq!(decide(&publication, RegistryView::Unregistered), expected);
        assert_eq!(decide(&publication, record(Some(2000), HOME)), expected);
    }

    #[test]
    fn assigned_without_reference_still_skips() {
        let publication = Publication::new("P2").with_xref(Xref::imex_primary(id(2000)));
        assert_eq!(
            decide(&publication, RegistryView::NotConsulted),
            EligibilityDecision::SkipUpToDate { imex_id: id(2000) }
        );
    }

    #[test]
    fn registry_mismatch_is_a_conflict() {
        let publication = Publication::new("P2")
            .with_external_ref("PMID:123")
            .with_xref(Xref::imex_primary(id(2000)));
        assert!(matches!(
            decide(&publication, record(Some(2001), HOME)),
            EligibilityDecision::RejectConflict { ref reason } if reason.contains("IM-2001")
        ));
    }

    #[test]
    fn malformed_primary_is_a_conflict() {
        let publication = Publication::new("P2")
            .with_xref(Xref::new(IMEX_DATABASE, "IM-x", QUALIFIER_PRIMARY));
        assert!(matches!(
            decide(&publication, RegistryView::NotConsulted),
            EligibilityDecision::RejectConflict { .. }
        ));
    }

    #[test]
    fn foreign_owner_wins_over_everything_but_conflict() {
        let publication = Publication::new("P5").with_external_ref("PMID:123");
        assert_eq!(
            decide(&publication, record(Some(77), "MINT")),
            EligibilityDecision::RejectForeign {
                imex_id: Some(id(77)),
                owner: "MINT".to_string(),
            }
        );
    }

    #[test]
    fn registry_held_identifier_is_adopted() {
        let publication = Publication::new("P6").with_external_ref("PMID:123");
        assert_eq!(
            decide(&publication, record(Some(55), "intact")),
            EligibilityDecision::AdoptRegistered { imex_id: id(55) }
        );
        assert_eq!(
            decide(&publication, record(None, HOME)),
            EligibilityDecision::Proceed
        );
    }
}
