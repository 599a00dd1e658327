//! Curation records: publications and the evidence they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::ContentHash;
use crate::error::IdentifierError;
use crate::external_ref::ExternalRef;
use crate::xref::Xref;

pub const STATUS_ACCEPTED: &str = "accepted";
pub const STATUS_READY_FOR_RELEASE: &str = "ready-for-release";
pub const STATUS_RELEASED: &str = "released";

/// Curation statuses whose publications are offered to the engine.
pub const PENDING_REVIEW_STATUSES: [&str; 3] =
    [STATUS_ACCEPTED, STATUS_READY_FOR_RELEASE, STATUS_RELEASED];

/// A curated publication and its evidence records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub ac: String,

    /// Bibliographic reference as curated (`PMID:123`, `DOI:10.x/y`, ...).
    /// Kept raw; eligibility is decided by parsing it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xrefs: Vec<Xref>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experiments: Vec<Experiment>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactions: Vec<Interaction>,

    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// An experiment described by a publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub ac: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xrefs: Vec<Xref>,
}

/// One piece of interaction evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub ac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_ac: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xrefs: Vec<Xref>,
}

fn default_status() -> String {
    STATUS_ACCEPTED.to_string()
}

fn default_timestamp() -> DateTime<Utc> {
    Utc::now()
}

impl Publication {
    pub fn new(ac: impl Into<String>) -> Self {
        Self {
            ac: ac.into(),
            external_ref: None,
            title: String::new(),
            status: default_status(),
            xrefs: Vec::new(),
            experiments: Vec::new(),
            interactions: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    pub fn with_xref(mut self, xref: Xref) -> Self {
        self.xrefs.push(xref);
        self
    }

    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interactions.push(interaction);
        self
    }

    pub fn with_experiment(mut self, experiment: Experiment) -> Self {
        self.experiments.push(experiment);
        self
    }

    pub fn is_pending_review(&self) -> bool {
        PENDING_REVIEW_STATUSES.contains(&self.status.as_str())
    }

    /// Parse the curated reference. A missing reference is unrecognized.
    pub fn parsed_external_ref(&self) -> Result<ExternalRef, IdentifierError> {
        match self.external_ref.as_deref() {
            Some(raw) => raw.parse(),
            None => Err(IdentifierError::UnrecognizedReference(String::new())),
        }
    }

    pub fn touch_updated_at(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Digest of identity-relevant content: reference, status, and every xref.
    ///
    /// Excludes `title` and `updated_at`.
    pub fn content_hash(&self) -> ContentHash {
        let mut builder = ContentHash::builder()
            .field("ac", &self.ac)
            .field_opt("external_ref", self.external_ref.as_deref())
            .field("status", &self.status);
        builder = feed_xrefs(builder, "xref", &self.xrefs);
        for experiment in &self.experiments {
            builder = builder.field("experiment", &experiment.ac);
            builder = feed_xrefs(builder, "experiment_xref", &experiment.xrefs);
        }
        for interaction in &self.interactions {
            builder = builder.field("interaction", &interaction.ac);
            builder = feed_xrefs(builder, "interaction_xref", &interaction.xrefs);
        }
        builder.finish()
    }
}

fn feed_xrefs(
    mut builder: crate::digest::ContentHashBuilder,
    name: &str,
    xrefs: &[Xref],
) -> crate::digest::ContentHashBuilder {
    let mut sorted: Vec<&Xref> = xrefs.iter().collect();
    sorted.sort();
    for xref in sorted {
        builder = builder.field(
            name,
            &format!("{}|{}|{}", xref.database, xref.id, xref.qualifier),
        );
    }
    builder
}

impl Experiment {
    pub fn new(ac: impl Into<String>) -> Self {
        Self {
            ac: ac.into(),
            xrefs: Vec::new(),
        }
    }
}

impl Interaction {
    pub fn new(ac: impl Into<String>) -> Self {
        Self {
            ac: ac.into(),
            experiment_ac: None,
            xrefs: Vec::new(),
        }
    }

    pub fn in_experiment(mut self, experiment_ac: impl Into<String>) -> Self {
        self.experiment_ac = Some(experiment_ac.into());
        self
    }

    pub fn with_xref(mut self, xref: Xref) -> Self {
        self.xrefs.push(xref);
        self
    }
}
