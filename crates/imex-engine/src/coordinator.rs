//! One assignment pass over the publications awaiting identifier review.
//!
//! Per publication: re-read → classify → (registry lookup) → evaluate → act
//! → notify. Nothing in-flight is persisted; a pass interrupted between the
//! primary attach and evidence propagation is finished by the next pass,
//! which sees the publication as already assigned.

use imex_central::{AllocationError, KeyAssigner, RangeAllocator, RegistryError};
use imex_kernel::{
    Classification, EligibilityDecision, Event, ImexId, Outcome, Publication, RegistryView, Xref,
    classify, evaluate, has_evidence_id, requires_registry,
};
use imex_store::{CurationStore, PrimaryWrite, StoreError};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::cancellation::Cancellation;
use crate::notifier::Notifier;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper, retry};
use crate::summary::RunSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Local institution, compared with registry record owners.
    pub institution: String,
    pub retry: RetryPolicy,
    /// Classify and evaluate only: no range reservation, no store writes.
    pub dry_run: bool,
    /// Explicit accessions to process instead of the pending list.
    pub only: Vec<String>,
}

impl CoordinatorConfig {
    pub fn new(institution: impl Into<String>) -> Self {
        Self {
            institution: institution.into(),
            retry: RetryPolicy::default(),
            dry_run: false,
            only: Vec::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_only(mut self, only: Vec<String>) -> Self {
        self.only = only;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("cannot list publications awaiting review: {0}")]
    PendingUnavailable(#[source] StoreError),
}

enum Action {
    Allocate,
    Adopt(ImexId),
    Repair(ImexId),
}

pub struct Coordinator<S, A> {
    store: S,
    allocator: RangeAllocator<A>,
    notifier: Notifier,
    config: CoordinatorConfig,
    cancellation: Cancellation,
    sleeper: Box<dyn Sleeper>,
}

impl<S: CurationStore, A: KeyAssigner> Coordinator<S, A> {
    pub fn new(
        store: S,
        allocator: RangeAllocator<A>,
        notifier: Notifier,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            allocator,
            notifier,
            config,
            cancellation: Cancellation::new(),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CoordinatorConfig {
        &mut self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn allocator(&self) -> &RangeAllocator<A> {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut RangeAllocator<A> {
        &mut self.allocator
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    /// Process every target publication once and report each outcome.
    ///
    /// Fails only when the target list itself cannot be read; per-publication
    /// failures become `Error` events.
    pub fn run(&mut self) -> Result<RunSummary, CoordinatorError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut summary = RunSummary::new(&run_id, &self.config.institution, self.config.dry_run);
        summary.store_ref_before = self.fingerprint();

        let targets = self.targets()?;
        let acquire_calls_before = self.allocator.acquire_calls();
        let failures_before = self.notifier.failures();
        info!(
            run_id = %run_id,
            institution = %self.config.institution,
            targets = targets.len(),
            dry_run = self.config.dry_run,
            "assignment run started"
        );

        for (index, ac) in targets.iter().enumerate() {
            if self.cancellation.is_cancelled() {
                summary.cancelled = true;
                summary.unprocessed = (targets.len() - index) as u64;
                warn!(unprocessed = summary.unprocessed, "assignment run cancelled");
                break;
            }

            let event = self.process(ac).in_run(&run_id, summary.processed + 1);
            let imex_id = event.imex_id.map(|id| id.to_string());
            info!(
                publication = %ac,
                outcome = %event.kind(),
                imex_id = imex_id.as_deref(),
                message = %event.message,
                "publication processed"
            );
            summary.record(event.kind());
            self.notifier.notify(&event);
        }

        self.notifier.finish();
        summary.acquire_calls = self.allocator.acquire_calls() - acquire_calls_before;
        summary.subscriber_failures = self.notifier.failures() - failures_before;
        summary.store_ref_after = self.fingerprint();
        summary.finished_at = chrono::Utc::now();
        info!(
            run_id = %run_id,
            assigned = summary.assigned,
            skipped = summary.skipped,
            conflicted = summary.conflicted,
            ineligible = summary.ineligible,
            registered_elsewhere = summary.registered_elsewhere,
            errored = summary.errored,
            "assignment run finished"
        );
        Ok(summary)
    }

    fn fingerprint(&self) -> Option<String> {
        match self.store.fingerprint() {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                warn!(error = %err, "store fingerprint unavailable");
                None
            }
        }
    }

    fn targets(&self) -> Result<Vec<String>, CoordinatorError> {
        if self.config.only.is_empty() {
            return self
                .store
                .pending_publications()
                .map_err(CoordinatorError::PendingUnavailable);
        }
        let unique: BTreeSet<&str> = self
            .config
            .only
            .iter()
            .map(|ac| ac.trim())
            .filter(|ac| !ac.is_empty())
            .collect();
        Ok(unique.into_iter().map(str::to_string).collect())
    }

    fn process(&mut self, ac: &str) -> Event {
        let publication = match self.store.publication(ac) {
            Ok(publication) => publication,
            Err(err) => {
                return Event::new(
                    ac,
                    Outcome::Error {
                        cause: err.to_string(),
                    },
                );
            }
        };

        let classification = classify(&publication);
        let mut notes = Vec::new();
        let registry = self.registry_view(&publication, &classification, &mut notes);
        let decision = evaluate(
            &publication,
            &classification,
            &registry,
            &self.config.institution,
        );
        debug!(
            publication = %ac,
            state = %classification.state,
            decision = decision.as_str(),
            "eligibility decided"
        );

        let mut event = self
            .decide(&publication, decision)
            .with_interactions(publication.interactions.iter().map(|i| i.ac.clone()).collect())
            .with_experiments(publication.experiments.iter().map(|e| e.ac.clone()).collect());
        if !notes.is_empty() {
            event.message = format!("{}; {}", event.message, notes.join("; "));
        }
        event
    }

    fn registry_view(
        &mut self,
        publication: &Publication,
        classification: &Classification,
        notes: &mut Vec<String>,
    ) -> RegistryView {
        if !requires_registry(publication, classification) {
            return RegistryView::NotConsulted;
        }
        let Ok(external_ref) = publication.parsed_external_ref() else {
            return RegistryView::NotConsulted;
        };

        let registry = self.allocator.registry_mut();
        let lookup = retry(
            &self.config.retry,
            self.sleeper.as_mut(),
            "registry lookup",
            || registry.lookup_publication(&external_ref),
            RegistryError::is_retryable,
        );
        match lookup {
            Ok(Some(record)) => RegistryView::Registered(record),
            Ok(None) => RegistryView::Unregistered,
            Err(failure) => {
                warn!(
                    publication = %publication.ac,
                    external_ref = %external_ref,
                    error = %failure,
                    "registry lookup unavailable; deciding from local state"
                );
                notes.push(format!("registry lookup unavailable: {failure}"));
                RegistryView::NotConsulted
            }
        }
    }

    fn decide(&mut self, publication: &Publication, decision: EligibilityDecision) -> Event {
        let ac = publication.ac.as_str();
        let action = match decision {
            EligibilityDecision::Proceed => Action::Allocate,
            EligibilityDecision::AdoptRegistered { imex_id } => Action::Adopt(imex_id),
            EligibilityDecision::SkipUpToDate { imex_id } => Action::Repair(imex_id),
            EligibilityDecision::RejectConflict { reason } => {
                return Event::new(ac, Outcome::Conflict { reason });
            }
            EligibilityDecision::RejectIneligible { reason } => {
                return Event::new(ac, Outcome::Ineligible { reason });
            }
            EligibilityDecision::RejectForeign { imex_id, owner } => {
                return Event::new(ac, Outcome::AlreadyRegisteredElsewhere { imex_id })
                    .with_message(format!("registered by {owner}"));
            }
        };

        if self.config.dry_run {
            plan(publication, action)
        } else {
            self.act(publication, action)
        }
    }

    fn act(&mut self, publication: &Publication, action: Action) -> Event {
        let ac = publication.ac.as_str();
        match action {
            Action::Allocate => {
                let drawn = retry(
                    &self.config.retry,
                    self.sleeper.as_mut(),
                    "range acquire",
                    || self.allocator.next_id(),
                    AllocationError::is_retryable,
                );
                match drawn {
                    Ok(imex_id) => self.attach_primary(ac, imex_id, format!("assigned {imex_id}")),
                    Err(failure) => Event::new(
                        ac,
                        Outcome::Error {
                            cause: format!("identifier allocation failed: {failure}"),
                        },
                    ),
                }
            }
            Action::Adopt(imex_id) => {
                self.attach_primary(ac, imex_id, format!("adopted {imex_id} from registry"))
            }
            Action::Repair(imex_id) => match self.propagate(ac, imex_id) {
                Ok(repaired) => {
                    let event = Event::new(ac, Outcome::AlreadyUpToDate).with_imex_id(Some(imex_id));
                    if repaired.is_empty() {
                        event
                    } else {
                        event.with_message(format!(
                            "already up to date; evidence repaired on {}",
                            repaired.join(", ")
                        ))
                    }
                }
                Err(err) => Event::new(
                    ac,
                    Outcome::Error {
                        cause: format!("evidence propagation for {imex_id} failed: {err}"),
                    },
                )
                .with_imex_id(Some(imex_id)),
            },
        }
    }

    /// Record `imex_id` as the publication's primary, then propagate it.
    ///
    /// The write is conditional: a primary that appeared since the
    /// publication was read wins, and `imex_id` is left unattached.
    fn attach_primary(&mut self, ac: &str, imex_id: ImexId, summary: String) -> Event {
        match self.store.attach_primary(ac, imex_id) {
            Ok(PrimaryWrite::Recorded | PrimaryWrite::AlreadyRecorded) => {}
            Ok(PrimaryWrite::Occupied { existing }) => {
                warn!(
                    publication = %ac,
                    imex_id = %imex_id,
                    existing = %existing.join(", "),
                    "primary recorded concurrently; identifier left unattached"
                );
                return Event::new(
                    ac,
                    Outcome::Conflict {
                        reason: format!(
                            "primary {} recorded while this pass ran; {imex_id} not attached",
                            existing.join(", ")
                        ),
                    },
                );
            }
            Err(err) => {
                warn!(publication = %ac, imex_id = %imex_id, error = %err, "primary identifier not recorded");
                return Event::new(
                    ac,
                    Outcome::Error {
                        cause: format!("could not record {imex_id}: {err}"),
                    },
                );
            }
        }

        match self.propagate(ac, imex_id) {
            Ok(updated) if updated.is_empty() => {
                Event::new(ac, Outcome::Assigned { imex_id }).with_message(summary)
            }
            Ok(updated) => Event::new(ac, Outcome::Assigned { imex_id })
                .with_message(format!("{summary}; evidence on {}", updated.join(", "))),
            Err(err) => Event::new(
                ac,
                Outcome::Error {
                    cause: format!(
                        "{imex_id} recorded but evidence propagation failed: {err}; the next pass completes it"
                    ),
                },
            )
            .with_imex_id(Some(imex_id)),
        }
    }

    /// Attach an evidence xref to every experiment and interaction of `ac`
    /// that has none yet. Returns the accessions written.
    fn propagate(&mut self, ac: &str, imex_id: ImexId) -> Result<Vec<String>, StoreError> {
        let evidence = Xref::imex_evidence(imex_id);
        let mut updated = Vec::new();

        for experiment in self.store.experiments_of(ac)? {
            if !has_evidence_id(&experiment.xrefs)
                && self.store.attach_experiment_xref(&experiment.ac, &evidence)?
            {
                updated.push(experiment.ac);
            }
        }
        for interaction in self.store.interactions_of(ac)? {
            if !has_evidence_id(&interaction.xrefs)
                && self.store.attach_interaction_xref(&interaction.ac, &evidence)?
            {
                updated.push(interaction.ac);
            }
        }
        Ok(updated)
    }
}

/// What `act` would do, without touching the registry's ranges or the store.
fn plan(publication: &Publication, action: Action) -> Event {
    let ac = publication.ac.as_str();
    match action {
        Action::Allocate => Event::new(
            ac,
            Outcome::Planned {
                decision: "assign a new identifier".to_string(),
            },
        ),
        Action::Adopt(imex_id) => Event::new(
            ac,
            Outcome::Planned {
                decision: format!("adopt {imex_id} from registry"),
            },
        )
        .with_imex_id(Some(imex_id)),
        Action::Repair(imex_id) => {
            let missing = lacking_evidence(publication);
            let event = Event::new(ac, Outcome::AlreadyUpToDate).with_imex_id(Some(imex_id));
            if missing.is_empty() {
                event
            } else {
                event.with_message(format!(
                    "already up to date; dry run: would repair evidence on {}",
                    missing.join(", ")
                ))
            }
        }
    }
}

fn lacking_evidence(publication: &Publication) -> Vec<String> {
    let experiments = publication
        .experiments
        .iter()
        .filter(|e| !has_evidence_id(&e.xrefs))
        .map(|e| e.ac.clone());
    let interactions = publication
        .interactions
        .iter()
        .filter(|i| !has_evidence_id(&i.xrefs))
        .map(|i| i.ac.clone());
    experiments.chain(interactions).collect()
}
