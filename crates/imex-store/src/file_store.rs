//! JSONL-file-backed curation store.
//!
//! Each read loads the file fresh; each attach is one lock-scoped
//! load → mutate → atomic rename, so a successful return means the write is
//! on disk.

use crate::atomic_store::mutate_store_jsonl;
use crate::contract::{CurationStore, PrimaryWrite, StoreError};
use crate::memory::MemoryStore;
use imex_kernel::{Experiment, ImexId, Interaction, Publication, Xref};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    /// Open an existing store file, validating that it loads.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        MemoryStore::load_jsonl(&path)?;
        Ok(Self { path })
    }

    /// Create (or truncate to) an empty store file.
    pub fn create_empty(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        MemoryStore::default().save_jsonl(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current on-disk state.
    pub fn snapshot(&self) -> Result<MemoryStore, StoreError> {
        MemoryStore::load_jsonl(&self.path)
    }

    fn mutate<F>(&self, mutator: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut MemoryStore) -> Result<bool, StoreError>,
    {
        mutate_store_jsonl(&self.path, |store| {
            mutator(store).map(|changed| (changed, changed))
        })
    }
}

impl CurationStore for JsonlStore {
    fn pending_publications(&self) -> Result<Vec<String>, StoreError> {
        self.snapshot()?.pending_publications()
    }

    fn publication(&self, ac: &str) -> Result<Publication, StoreError> {
        self.snapshot()?.publication(ac)
    }

    fn attach_publication_xref(&mut self, ac: &str, xref: &Xref) -> Result<bool, StoreError> {
        let changed = self.mutate(|store| store.attach_publication_xref(ac, xref))?;
        debug!(publication = ac, xref = %xref.id, changed, "publication xref write");
        Ok(changed)
    }

    fn attach_primary(&mut self, ac: &str, imex_id: ImexId) -> Result<PrimaryWrite, StoreError> {
        let outcome = mutate_store_jsonl(&self.path, |store| {
            let outcome = store.attach_primary(ac, imex_id)?;
            let changed = outcome == PrimaryWrite::Recorded;
            Ok((outcome, changed))
        })?;
        debug!(publication = ac, imex_id = %imex_id, ?outcome, "conditional primary write");
        Ok(outcome)
    }

    fn interactions_of(&self, ac: &str) -> Result<Vec<Interaction>, StoreError> {
        self.snapshot()?.interactions_of(ac)
    }

    fn attach_interaction_xref(
        &mut self,
        interaction_ac: &str,
        xref: &Xref,
    ) -> Result<bool, StoreError> {
        let changed = self.mutate(|store| store.attach_interaction_xref(interaction_ac, xref))?;
        debug!(interaction = interaction_ac, xref = %xref.id, changed, "interaction xref write");
        Ok(changed)
    }

    fn experiments_of(&self, ac: &str) -> Result<Vec<Experiment>, StoreError> {
        self.snapshot()?.experiments_of(ac)
    }

    fn attach_experiment_xref(
        &mut self,
        experiment_ac: &str,
        xref: &Xref,
    ) -> Result<bool, StoreError> {
        let changed = self.mutate(|store| store.attach_experiment_xref(experiment_ac, xref))?;
        debug!(experiment = experiment_ac, xref = %xref.id, changed, "experiment xref write");
        Ok(changed)
    }

    fn fingerprint(&self) -> Result<Option<String>, StoreError> {
        Ok(Some(self.snapshot()?.snapshot_ref()))
    }
}
