//! Assignment outcomes and the events that carry them.
//!
//! `imex.assignment.event.v1` is the envelope every subscriber receives.
//! Events are built once by the coordinator and only read afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::xref::ImexId;

pub const ASSIGNMENT_EVENT_SCHEMA: &str = "imex.assignment.event.v1";

fn default_assignment_event_schema() -> String {
    ASSIGNMENT_EVENT_SCHEMA.to_string()
}

/// Terminal result of processing one publication in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Assigned { imex_id: ImexId },
    AlreadyUpToDate,
    Conflict { reason: String },
    Ineligible { reason: String },
    AlreadyRegisteredElsewhere {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        imex_id: Option<ImexId>,
    },
    Error { cause: String },
    /// Dry run: the decision that would have been acted on.
    Planned { decision: String },
}

/// Outcome discriminant, used for counting and report routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Assigned,
    UpToDate,
    Conflict,
    Ineligible,
    RegisteredElsewhere,
    Error,
    Planned,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 7] = [
        OutcomeKind::Assigned,
        OutcomeKind::UpToDate,
        OutcomeKind::Conflict,
        OutcomeKind::Ineligible,
        OutcomeKind::RegisteredElsewhere,
        OutcomeKind::Error,
        OutcomeKind::Planned,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Assigned => "assigned",
            OutcomeKind::UpToDate => "up_to_date",
            OutcomeKind::Conflict => "conflict",
            OutcomeKind::Ineligible => "ineligible",
            OutcomeKind::RegisteredElsewhere => "registered_elsewhere",
            OutcomeKind::Error => "error",
            OutcomeKind::Planned => "planned",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Assigned { .. } => OutcomeKind::Assigned,
            Outcome::AlreadyUpToDate => OutcomeKind::UpToDate,
            Outcome::Conflict { .. } => OutcomeKind::Conflict,
            Outcome::Ineligible { .. } => OutcomeKind::Ineligible,
            Outcome::AlreadyRegisteredElsewhere { .. } => OutcomeKind::RegisteredElsewhere,
            Outcome::Error { .. } => OutcomeKind::Error,
            Outcome::Planned { .. } => OutcomeKind::Planned,
        }
    }

    pub fn imex_id(&self) -> Option<ImexId> {
        match self {
            Outcome::Assigned { imex_id } => Some(*imex_id),
            Outcome::AlreadyRegisteredElsewhere { imex_id } => *imex_id,
            _ => None,
        }
    }

    fn default_message(&self) -> String {
        match self {
            Outcome::Assigned { imex_id } => format!("assigned {imex_id}"),
            Outcome::AlreadyUpToDate => "already up to date".to_string(),
            Outcome::Conflict { reason } | Outcome::Ineligible { reason } => reason.clone(),
            Outcome::AlreadyRegisteredElsewhere { .. } => {
                "registered by another institution".to_string()
            }
            Outcome::Error { cause } => cause.clone(),
            Outcome::Planned { decision } => format!("dry run: would {decision}"),
        }
    }
}

/// One outcome plus the context needed to act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "default_assignment_event_schema")]
    pub schema: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_id: String,
    #[serde(default)]
    pub sequence: u64,
    pub publication_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imex_id: Option<ImexId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interaction_acs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experiment_acs: Vec<String>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    pub fn new(publication_id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            schema: ASSIGNMENT_EVENT_SCHEMA.to_string(),
            run_id: String::new(),
            sequence: 0,
            publication_id: publication_id.into(),
            imex_id: outcome.imex_id(),
            interaction_acs: Vec::new(),
            experiment_acs: Vec::new(),
            message: outcome.default_message(),
            outcome,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_imex_id(mut self, imex_id: Option<ImexId>) -> Self {
        if imex_id.is_some() {
            self.imex_id = imex_id;
        }
        self
    }

    pub fn with_interactions(mut self, acs: Vec<String>) -> Self {
        self.interaction_acs = acs;
        self
    }

    pub fn with_experiments(mut self, acs: Vec<String>) -> Self {
        self.experiment_acs = acs;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn in_run(mut self, run_id: impl Into<String>, sequence: u64) -> Self {
        self.run_id = run_id.into();
        self.sequence = sequence;
        self
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    pub fn kind(&self) -> OutcomeKind {
        self.outcome.kind()
    }
}
