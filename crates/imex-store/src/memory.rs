//! Canonical in-memory representation of curation state.
//!
//! This is the memory boundary for `imex-store`:
//! - load/store JSONL
//! - resolve evidence accessions to their owning publication
//! - deterministic (accession-ordered) iteration

use crate::contract::{CurationStore, PrimaryWrite, StoreError, place_primary};
use crate::jsonl::{read_publications_from_path, write_publications_to_path};
use imex_kernel::{ContentHash, Experiment, ImexId, Interaction, Publication, Xref};
use std::collections::BTreeMap;
use std::path::Path;

pub const STORE_SNAPSHOT_REF_PREFIX: &str = "cs1_";

/// Canonical in-memory state for publications and their evidence.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    publications: BTreeMap<String, Publication>,
    interaction_owner: BTreeMap<String, String>,
    experiment_owner: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Build a store from fully-materialized publications.
    ///
    /// Duplicate publication accessions resolve last-write-wins. An
    /// interaction or experiment accession claimed by two publications is
    /// rejected.
    pub fn from_publications(publications: Vec<Publication>) -> Result<Self, StoreError> {
        let mut store = Self::default();
        for publication in publications {
            store.publications.insert(publication.ac.clone(), publication);
        }
        store.reindex()?;
        Ok(store)
    }

    /// Load store state from a JSONL file.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let publications = read_publications_from_path(path)?;
        Self::from_publications(publications)
    }

    /// Persist store state to a JSONL file.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let publications: Vec<Publication> = self.publications.values().cloned().collect();
        write_publications_to_path(path, &publications)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.publications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publications.is_empty()
    }

    pub fn get(&self, ac: &str) -> Option<&Publication> {
        self.publications.get(ac)
    }

    /// Insert or replace a publication by accession.
    ///
    /// Returns the previous value if present. On an accession clash the
    /// store is left as it was.
    pub fn upsert_publication(
        &mut self,
        publication: Publication,
    ) -> Result<Option<Publication>, StoreError> {
        let ac = publication.ac.clone();
        let previous = self.publications.insert(ac.clone(), publication);
        if let Err(err) = self.reindex() {
            match previous {
                Some(prev) => {
                    self.publications.insert(ac, prev);
                }
                None => {
                    self.publications.remove(&ac);
                }
            }
            self.reindex()?;
            return Err(err);
        }
        Ok(previous)
    }

    /// Iterate all publications in accession order.
    pub fn publications(&self) -> impl Iterator<Item = &Publication> {
        self.publications.values()
    }

    /// Digest over every publication's content hash, in accession order.
    pub fn snapshot_ref(&self) -> String {
        let mut builder = ContentHash::builder();
        for publication in self.publications.values() {
            builder = builder.field(&publication.ac, &publication.content_hash().0);
        }
        format!("{STORE_SNAPSHOT_REF_PREFIX}{}", builder.finish())
    }

    fn reindex(&mut self) -> Result<(), StoreError> {
        let mut interactions = BTreeMap::new();
        let mut experiments = BTreeMap::new();
        for publication in self.publications.values() {
            for interaction in &publication.interactions {
                claim(&mut interactions, &interaction.ac, &publication.ac)?;
            }
            for experiment in &publication.experiments {
                claim(&mut experiments, &experiment.ac, &publication.ac)?;
            }
        }
        self.interaction_owner = interactions;
        self.experiment_owner = experiments;
        Ok(())
    }

    fn publication_mut(&mut self, ac: &str) -> Result<&mut Publication, StoreError> {
        self.publications
            .get_mut(ac)
            .ok_or_else(|| StoreError::PublicationNotFound(ac.to_string()))
    }
}

fn claim(
    index: &mut BTreeMap<String, String>,
    ac: &str,
    owner: &str,
) -> Result<(), StoreError> {
    if let Some(first) = index.get(ac)
        && first != owner
    {
        return Err(StoreError::DuplicateAccession {
            ac: ac.to_string(),
            first: first.clone(),
            second: owner.to_string(),
        });
    }
    index.insert(ac.to_string(), owner.to_string());
    Ok(())
}

fn push_unique(xrefs: &mut Vec<Xref>, xref: &Xref) -> bool {
    if xrefs.contains(xref) {
        return false;
    }
    xrefs.push(xref.clone());
    true
}

impl CurationStore for MemoryStore {
    fn pending_publications(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .publications
            .values()
            .filter(|p| p.is_pending_review())
            .map(|p| p.ac.clone())
            .collect())
    }

    fn publication(&self, ac: &str) -> Result<Publication, StoreError> {
        self.get(ac)
            .cloned()
            .ok_or_else(|| StoreError::PublicationNotFound(ac.to_string()))
    }

    fn attach_publication_xref(&mut self, ac: &str, xref: &Xref) -> Result<bool, StoreError> {
        let publication = self.publication_mut(ac)?;
        let changed = push_unique(&mut publication.xrefs, xref);
        if changed {
            publication.touch_updated_at();
        }
        Ok(changed)
    }

    fn attach_primary(&mut self, ac: &str, imex_id: ImexId) -> Result<PrimaryWrite, StoreError> {
        let publication = self.publication_mut(ac)?;
        let outcome = place_primary(&mut publication.xrefs, imex_id);
        if outcome == PrimaryWrite::Recorded {
            publication.touch_updated_at();
        }
        Ok(outcome)
    }

    fn interactions_of(&self, ac: &str) -> Result<Vec<Interaction>, StoreError> {
        self.get(ac)
            .map(|p| p.interactions.clone())
            .ok_or_else(|| StoreError::PublicationNotFound(ac.to_string()))
    }

    fn attach_interaction_xref(
        &mut self,
        interaction_ac: &str,
        xref: &Xref,
    ) -> Result<bool, StoreError> {
        let owner = self
            .interaction_owner
            .get(interaction_ac)
            .cloned()
            .ok_or_else(|| StoreError::InteractionNotFound(interaction_ac.to_string()))?;
        let publication = self.publication_mut(&owner)?;
        let interaction = publication
            .interactions
            .iter_mut()
            .find(|i| i.ac == interaction_ac)
            .ok_or_else(|| StoreError::InteractionNotFound(interaction_ac.to_string()))?;
        let changed = push_unique(&mut interaction.xrefs, xref);
        if changed {
            publication.touch_updated_at();
        }
        Ok(changed)
    }

    fn experiments_of(&self, ac: &str) -> Result<Vec<Experiment>, StoreError> {
        self.get(ac)
            .map(|p| p.experiments.clone())
            .ok_or_else(|| StoreError::PublicationNotFound(ac.to_string()))
    }

    fn attach_experiment_xref(
        &mut self,
        experiment_ac: &str,
        xref: &Xref,
    ) -> Result<bool, StoreError> {
        let owner = self
            .experiment_owner
            .get(experiment_ac)
            .cloned()
            .ok_or_else(|| StoreError::ExperimentNotFound(experiment_ac.to_string()))?;
        let publication = self.publication_mut(&owner)?;
        let experiment = publication
            .experiments
            .iter_mut()
            .find(|e| e.ac == experiment_ac)
            .ok_or_else(|| StoreError::ExperimentNotFound(experiment_ac.to_string()))?;
        let changed = push_unique(&mut experiment.xrefs, xref);
        if changed {
            publication.touch_updated_at();
        }
        Ok(changed)
    }

    fn fingerprint(&self) -> Result<Option<String>, StoreError> {
        Ok(Some(self.snapshot_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imex_kernel::{ImexId, STATUS_RELEASED};

    fn publication(ac: &str, interactions: &[&str]) -> Publication {
        let mut p = Publication::new(ac).with_external_ref("PMID:1");
        for ia in interactions {
            p = p.with_interaction(Interaction::new(*ia));
        }
        p
    }

    fn evidence(value: u64) -> Xref {
        Xref::imex_evidence(ImexId::new(value).expect("non-zero id"))
    }

    #[test]
    fn pending_publications_are_accession_ordered_and_filtered() {
        let mut draft = publication("EBI-0", &[]);
        draft.status = "curation in progress".to_string();
        let mut released = publication("EBI-3", &[]);
        released.status = STATUS_RELEASED.to_string();
        let store = MemoryStore::from_publications(vec![
            released,
            publication("EBI-2", &[]),
            draft,
        ])
        .expect("store should build");

        assert_eq!(
            store.pending_publications().expect("pending should list"),
            vec!["EBI-2".to_string(), "EBI-3".to_string()]
        );
    }

    #[test]
    fn duplicate_publication_ids_use_last_write_wins() {
        let first = publication("EBI-1", &["EBI-10"]);
        let second = publication("EBI-1", &["EBI-11"]);
        let store = MemoryStore::from_publications(vec![first, second]).expect("store builds");
        let interactions = store.interactions_of("EBI-1").expect("publication exists");
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].ac, "EBI-11");
    }

    #[test]
    fn interaction_claimed_twice_is_rejected() {
        let err = MemoryStore::from_publications(vec![
            publication("EBI-1", &["EBI-10"]),
            publication("EBI-2", &["EBI-10"]),
        ])
        .expect_err("shared interaction must fail");
        assert!(matches!(err, StoreError::DuplicateAccession { ac, .. } if ac == "EBI-10"));
    }

    #[test]
    fn attach_interaction_xref_is_idempotent() {
        let mut store =
            MemoryStore::from_publications(vec![publication("EBI-1", &["EBI-10", "EBI-11"])])
                .expect("store builds");

        assert!(
            store
                .attach_interaction_xref("EBI-10", &evidence(5))
                .expect("first attach")
        );
        assert!(
            !store
                .attach_interaction_xref("EBI-10", &evidence(5))
                .expect("second attach")
        );
        let interactions = store.interactions_of("EBI-1").expect("publication exists");
        assert_eq!(interactions[0].xrefs.len(), 1);
        assert!(interactions[1].xrefs.is_empty());
    }

    #[test]
    fn attach_to_unknown_records_errors() {
        let mut store = MemoryStore::from_publications(vec![publication("EBI-1", &[])])
            .expect("store builds");
        assert!(matches!(
            store.attach_interaction_xref("EBI-404", &evidence(1)),
            Err(StoreError::InteractionNotFound(ac)) if ac == "EBI-404"
        ));
        assert!(matches!(
            store.attach_experiment_xref("EBI-405", &evidence(1)),
            Err(StoreError::ExperimentNotFound(_))
        ));
        assert!(matches!(
            store.attach_publication_xref("EBI-406", &evidence(1)),
            Err(StoreError::PublicationNotFound(_))
        ));
    }

    #[test]
    fn upsert_with_clashing_accession_leaves_store_unchanged() {
        let mut store = MemoryStore::from_publications(vec![publication("EBI-1", &["EBI-10"])])
            .expect("store builds");
        let before = store.snapshot_ref();
        let err = store
            .upsert_publication(publication("EBI-2", &["EBI-10"]))
            .expect_err("clash must fail");
        assert!(matches!(err, StoreError::DuplicateAccession { .. }));
        assert!(store.get("EBI-2").is_none());
        assert_eq!(store.snapshot_ref(), before);
        assert!(
            store
                .attach_interaction_xref("EBI-10", &evidence(2))
                .expect("index still points at EBI-1")
        );
    }

    #[test]
    fn snapshot_ref_tracks_xref_changes() {
        let mut store = MemoryStore::from_publications(vec![publication("EBI-1", &["EBI-10"])])
            .expect("store builds");
        let before = store.snapshot_ref();
        assert!(before.starts_with(STORE_SNAPSHOT_REF_PREFIX));
        store
            .attach_interaction_xref("EBI-10", &evidence(3))
            .expect("attach");
        assert_ne!(store.snapshot_ref(), before);
    }

    #[test]
    fn conditional_primary_write_never_adds_a_second_primary() {
        let mut store = MemoryStore::from_publications(vec![publication("EBI-1", &[])])
            .expect("store builds");
        let first = ImexId::new(5).expect("non-zero id");
        let second = ImexId::new(6).expect("non-zero id");

        assert_eq!(
            store.attach_primary("EBI-1", first).expect("write"),
            PrimaryWrite::Recorded
        );
        assert_eq!(
            store.attach_primary("EBI-1", first).expect("write"),
            PrimaryWrite::AlreadyRecorded
        );
        let before = store.snapshot_ref();
        assert_eq!(
            store.attach_primary("EBI-1", second).expect("write"),
            PrimaryWrite::Occupied {
                existing: vec!["IM-5".to_string()]
            }
        );
        assert_eq!(store.snapshot_ref(), before);
        assert!(matches!(
            store.attach_primary("EBI-404", first),
            Err(StoreError::PublicationNotFound(_))
        ));
    }
}
