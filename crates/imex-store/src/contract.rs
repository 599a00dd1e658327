//! The narrow read/write contract the engine needs from a curation store.

use imex_kernel::{Experiment, ImexId, Interaction, Publication, Xref, classify_xrefs};

use crate::jsonl::JsonlError;

/// Errors raised by curation store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error("publication not found: {0}")]
    PublicationNotFound(String),

    #[error("interaction not found: {0}")]
    InteractionNotFound(String),

    #[error("experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("accession {ac} appears in both {first} and {second}")]
    DuplicateAccession {
        ac: String,
        first: String,
        second: String,
    },

    #[error("curation store lock busy: {lock_path}")]
    LockBusy { lock_path: String },

    #[error("failed to acquire curation store lock {lock_path}: {message}")]
    LockIo { lock_path: String, message: String },

    #[error("curation store unavailable: {0}")]
    Unavailable(String),
}

/// Result of a conditional primary-identifier write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryWrite {
    Recorded,
    /// The same primary was already on the publication.
    AlreadyRecorded,
    /// Another primary got there first; nothing was written.
    Occupied { existing: Vec<String> },
}

/// Apply a primary write to an xref list: attach only when the list carries
/// no primary, or already carries this one.
pub fn place_primary(xrefs: &mut Vec<Xref>, imex_id: ImexId) -> PrimaryWrite {
    let existing = classify_xrefs(xrefs).primary_ids;
    let rendered = imex_id.to_string();
    if existing.contains(&rendered) {
        return PrimaryWrite::AlreadyRecorded;
    }
    if !existing.is_empty() {
        return PrimaryWrite::Occupied { existing };
    }
    xrefs.push(Xref::imex_primary(imex_id));
    PrimaryWrite::Recorded
}

/// Read/write access to publications and their evidence records.
///
/// Every read returns current state. Attaching an xref that is already
/// present returns `Ok(false)` and leaves the record untouched; `Ok(true)`
/// means the write was committed.
pub trait CurationStore {
    /// Accessions of publications awaiting identifier review, in the order
    /// they must be processed.
    fn pending_publications(&self) -> Result<Vec<String>, StoreError>;

    fn publication(&self, ac: &str) -> Result<Publication, StoreError>;

    fn cross_references(&self, ac: &str) -> Result<Vec<Xref>, StoreError> {
        Ok(self.publication(ac)?.xrefs)
    }

    fn attach_publication_xref(&mut self, ac: &str, xref: &Xref) -> Result<bool, StoreError>;

    /// Attach `imex_id` as the publication's primary unless a different
    /// primary is present. Backends that can check and write in one step
    /// should override this; the default re-reads then writes.
    fn attach_primary(&mut self, ac: &str, imex_id: ImexId) -> Result<PrimaryWrite, StoreError> {
        let mut xrefs = self.cross_references(ac)?;
        match place_primary(&mut xrefs, imex_id) {
            PrimaryWrite::Recorded => {
                self.attach_publication_xref(ac, &Xref::imex_primary(imex_id))?;
                Ok(PrimaryWrite::Recorded)
            }
            other => Ok(other),
        }
    }

    fn interactions_of(&self, ac: &str) -> Result<Vec<Interaction>, StoreError> {
        Ok(self.publication(ac)?.interactions)
    }

    fn attach_interaction_xref(
        &mut self,
        interaction_ac: &str,
        xref: &Xref,
    ) -> Result<bool, StoreError>;

    fn experiments_of(&self, ac: &str) -> Result<Vec<Experiment>, StoreError> {
        Ok(self.publication(ac)?.experiments)
    }

    fn attach_experiment_xref(
        &mut self,
        experiment_ac: &str,
        xref: &Xref,
    ) -> Result<bool, StoreError>;

    /// Content digest of the whole store, when the backend can compute one.
    fn fingerprint(&self) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
}
