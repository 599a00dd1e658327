use chrono::{DateTime, Utc};
use imex_kernel::OutcomeKind;
use serde::{Deserialize, Serialize};

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERRORS: i32 = 2;
pub const EXIT_CANCELLED: i32 = 130;

/// Counts and bookkeeping for one coordinator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub institution: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed: u64,
    pub assigned: u64,
    pub skipped: u64,
    pub conflicted: u64,
    pub ineligible: u64,
    pub registered_elsewhere: u64,
    pub errored: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub planned: u64,
    pub cancelled: bool,
    pub unprocessed: u64,
    /// Remote range reservations attempted during the run.
    pub acquire_calls: u64,
    pub subscriber_failures: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_ref_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_ref_after: Option<String>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, institution: impl Into<String>, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            institution: institution.into(),
            dry_run,
            started_at: now,
            finished_at: now,
            processed: 0,
            assigned: 0,
            skipped: 0,
            conflicted: 0,
            ineligible: 0,
            registered_elsewhere: 0,
            errored: 0,
            planned: 0,
            cancelled: false,
            unprocessed: 0,
            acquire_calls: 0,
            subscriber_failures: 0,
            store_ref_before: None,
            store_ref_after: None,
        }
    }

    pub fn record(&mut self, kind: OutcomeKind) {
        self.processed += 1;
        match kind {
            OutcomeKind::Assigned => self.assigned += 1,
            OutcomeKind::UpToDate => self.skipped += 1,
            OutcomeKind::Conflict => self.conflicted += 1,
            OutcomeKind::Ineligible => self.ineligible += 1,
            OutcomeKind::RegisteredElsewhere => self.registered_elsewhere += 1,
            OutcomeKind::Error => self.errored += 1,
            OutcomeKind::Planned => self.planned += 1,
        }
    }

    pub fn count(&self, kind: OutcomeKind) -> u64 {
        match kind {
            OutcomeKind::Assigned => self.assigned,
            OutcomeKind::UpToDate => self.skipped,
            OutcomeKind::Conflict => self.conflicted,
            OutcomeKind::Ineligible => self.ineligible,
            OutcomeKind::RegisteredElsewhere => self.registered_elsewhere,
            OutcomeKind::Error => self.errored,
            OutcomeKind::Planned => self.planned,
        }
    }

    /// `None` when the store cannot fingerprint itself.
    pub fn store_changed(&self) -> Option<bool> {
        match (&self.store_ref_before, &self.store_ref_after) {
            (Some(before), Some(after)) => Some(before != after),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            EXIT_CANCELLED
        } else if self.errored > 0 {
            EXIT_ERRORS
        } else {
            EXIT_OK
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_routes_each_kind_to_its_counter() {
        let mut summary = RunSummary::new("run", "IntAct", false);
        for kind in OutcomeKind::ALL {
            summary.record(kind);
        }
        summary.record(OutcomeKind::Assigned);
        assert_eq!(summary.processed, 8);
        assert_eq!(summary.count(OutcomeKind::Assigned), 2);
        for kind in OutcomeKind::ALL.into_iter().skip(1) {
            assert_eq!(summary.count(kind), 1, "{kind}");
        }
    }

    #[test]
    fn exit_code_prefers_cancellation_then_errors() {
        let mut summary = RunSummary::new("run", "IntAct", false);
        assert_eq!(summary.exit_code(), EXIT_OK);
        summary.record(OutcomeKind::Conflict);
        assert_eq!(summary.exit_code(), EXIT_OK);
        summary.record(OutcomeKind::Error);
        assert_eq!(summary.exit_code(), EXIT_ERRORS);
        summary.cancelled = true;
        assert_eq!(summary.exit_code(), EXIT_CANCELLED);
    }

    #[test]
    fn json_uses_camel_case_counts() {
        let mut summary = RunSummary::new("run", "IntAct", false);
        summary.record(OutcomeKind::RegisteredElsewhere);
        let json = serde_json::to_value(&summary).expect("summary serializes");
        assert_eq!(json["registeredElsewhere"], 1);
        assert_eq!(json["errored"], 0);
        assert!(json.get("planned").is_none());
    }
}
