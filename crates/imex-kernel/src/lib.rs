//! # IMEx kernel
//!
//! Identifier model and decision logic for IMEx identifier assignment.
//!
//! This crate is pure: it never touches a store or the registry. It answers
//! two questions about a publication as it currently stands:
//!
//! ```text
//! Publication ── classify ──▶ Classification { NONE | EVIDENCE_ONLY | PRIMARY_ASSIGNED | CONFLICTED }
//!      │                              │
//!      └──────── evaluate ◀───────────┘ ◀── RegistryView
//!                   │
//!                   ▼
//!          EligibilityDecision ──(coordinator)──▶ Outcome ──▶ Event
//! ```

pub mod digest;
pub mod error;
pub mod event;
pub mod external_ref;
pub mod policy;
pub mod range;
pub mod record;
pub mod resolver;
pub mod xref;

pub use digest::{ContentHash, ContentHashBuilder};
pub use error::IdentifierError;
pub use event::{ASSIGNMENT_EVENT_SCHEMA, Event, Outcome, OutcomeKind};
pub use external_ref::ExternalRef;
pub use policy::{EligibilityDecision, RegistryRecord, RegistryView, evaluate, requires_registry};
pub use range::IdentifierRange;
pub use record::{
    Experiment, Interaction, PENDING_REVIEW_STATUSES, Publication, STATUS_ACCEPTED,
    STATUS_READY_FOR_RELEASE, STATUS_RELEASED,
};
pub use resolver::{Classification, PublicationState, classify, classify_xrefs};
pub use xref::{
    IMEX_DATABASE, ImexId, QUALIFIER_EVIDENCE, QUALIFIER_PRIMARY, Xref, has_evidence_id,
};
