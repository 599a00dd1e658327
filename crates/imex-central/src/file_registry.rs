//! A registry backed by one JSON file.
//!
//! Stands in for the central registry on a single machine: it keeps the
//! identifier cursor, the partner tag, the users allowed to reserve ranges,
//! and the publication records it knows about. A reservation runs
//! load → advance cursor → save under an exclusive `<file>.lock`, and the
//! cursor is on disk before the range is returned. Several handles on one
//! file, in one process or many, never receive overlapping ranges; a handle
//! that finds the lock held gets a retryable transport error.

use chrono::{DateTime, Utc};
use imex_kernel::{ExternalRef, IdentifierRange, RegistryRecord};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::registry::{Credentials, KeyAssigner, RegistryError};

/// Persisted registry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    pub partner: String,
    pub next_identifier: u64,
    #[serde(default)]
    pub authorized_users: Vec<String>,
    #[serde(default)]
    pub records: Vec<RegistryRecord>,
    #[serde(default)]
    pub submissions: Vec<SubmissionEntry>,
}

/// Audit entry for one reserved range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEntry {
    pub range: IdentifierRange,
    pub username: String,
    pub reserved_at: DateTime<Utc>,
}

impl RegistryState {
    pub fn new(partner: impl Into<String>, first_identifier: u64) -> Self {
        Self {
            partner: partner.into(),
            next_identifier: first_identifier.max(1),
            authorized_users: Vec::new(),
            records: Vec::new(),
            submissions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
    credentials: Credentials,
}

impl FileRegistry {
    pub fn open(path: impl AsRef<Path>, credentials: Credentials) -> Result<Self, RegistryError> {
        let registry = Self {
            path: path.as_ref().to_path_buf(),
            credentials,
        };
        registry.load()?;
        Ok(registry)
    }

    /// Write a fresh registry file.
    pub fn init(path: impl AsRef<Path>, state: &RegistryState) -> Result<(), RegistryError> {
        save_state(path.as_ref(), state)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<RegistryState, RegistryError> {
        Self::read_state(&self.path)
    }

    /// Read a registry file without presenting credentials.
    pub fn read_state(path: impl AsRef<Path>) -> Result<RegistryState, RegistryError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| RegistryError::Transport(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| RegistryError::Transport(format!("{}: {e}", path.display())))
    }

    fn authenticate(&self, state: &RegistryState) -> Result<(), RegistryError> {
        let username = self.credentials.username.trim();
        if username.is_empty() || self.credentials.password.is_empty() {
            return Err(RegistryError::Authentication(
                "username and password are required".to_string(),
            ));
        }
        if !state.authorized_users.iter().any(|user| user == username) {
            return Err(RegistryError::Authentication(format!(
                "user {username:?} may not reserve identifiers"
            )));
        }
        Ok(())
    }
}

impl KeyAssigner for FileRegistry {
    fn request_range(&mut self, count: u64) -> Result<IdentifierRange, RegistryError> {
        if count == 0 {
            return Err(RegistryError::Refused(
                "range size must be positive".to_string(),
            ));
        }
        let _lock = ReservationLock::take(&self.path)?;
        let mut state = self.load()?;
        self.authenticate(&state)?;

        let from = state.next_identifier;
        let to = from
            .checked_add(count - 1)
            .ok_or_else(|| RegistryError::Refused("identifier space exhausted".to_string()))?;
        let range = IdentifierRange {
            submission_id: uuid::Uuid::new_v4().to_string(),
            from,
            to,
            partner: state.partner.clone(),
        };
        state.next_identifier = to + 1;
        state.submissions.push(SubmissionEntry {
            range: range.clone(),
            username: self.credentials.username.clone(),
            reserved_at: Utc::now(),
        });
        save_state(&self.path, &state)?;
        debug!(from, to, path = %self.path.display(), "file registry reserved range");
        Ok(range)
    }

    fn lookup_publication(
        &mut self,
        external_ref: &ExternalRef,
    ) -> Result<Option<RegistryRecord>, RegistryError> {
        let state = self.load()?;
        self.authenticate(&state)?;
        let key = external_ref.to_string();
        Ok(state
            .records
            .into_iter()
            .find(|record| matches_ref(&record.external_ref, external_ref, &key)))
    }
}

fn matches_ref(recorded: &str, wanted: &ExternalRef, key: &str) -> bool {
    match recorded.parse::<ExternalRef>() {
        Ok(parsed) => parsed == *wanted,
        Err(_) => recorded == key,
    }
}

fn save_state(path: &Path, state: &RegistryState) -> Result<(), RegistryError> {
    let body = serde_json::to_string_pretty(state)
        .map_err(|e| RegistryError::Transport(format!("serialize registry: {e}")))?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| RegistryError::Transport(format!("{}: {e}", parent.display())))?;
    }
    let tmp = sibling(path, &format!(".staging.{}", uuid::Uuid::new_v4().simple()));
    if let Err(e) = fs::write(&tmp, body) {
        let _ = fs::remove_file(&tmp);
        return Err(RegistryError::Transport(format!("{}: {e}", tmp.display())));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        RegistryError::Transport(format!("{} -> {}: {e}", tmp.display(), path.display()))
    })
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Sidecar `<registry>.lock`, held for one reservation and removed on drop.
struct ReservationLock {
    path: PathBuf,
    _file: File,
}

impl ReservationLock {
    fn take(registry_path: &Path) -> Result<Self, RegistryError> {
        let path = sibling(registry_path, ".lock");
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RegistryError::Transport(format!(
                    "registry lock busy: {}",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(RegistryError::Transport(format!(
                    "registry lock {}: {e}",
                    path.display()
                )));
            }
        };
        let _ = writeln!(file, "pid={} acquired={}", std::process::id(), Utc::now().to_rfc3339());
        Ok(Self { path, _file: file })
    }
}

impl Drop for ReservationLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imex_kernel::ImexId;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_registry(prefix: &str, state: &RegistryState) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir()
            .join(format!("imex-registry-{prefix}-{}-{unique}", std::process::id()))
            .join("registry.json");
        FileRegistry::init(&path, state).expect("registry should init");
        path
    }

    fn state() -> RegistryState {
        let mut state = RegistryState::new("IntAct", 1000);
        state.authorized_users.push("curator".to_string());
        state
    }

    fn curator() -> Credentials {
        Credentials::new("curator", "pw")
    }

    #[test]
    fn consecutive_ranges_never_overlap_and_survive_reopen() {
        let path = temp_registry("ranges", &state());
        let mut registry = FileRegistry::open(&path, curator()).expect("open");
        let first = registry.request_range(3).expect("first range");
        assert_eq!((first.from, first.to), (1000, 1002));
        assert_eq!(first.partner, "IntAct");

        let mut reopened = FileRegistry::open(&path, curator()).expect("reopen");
        let second = reopened.request_range(1).expect("second range");
        assert_eq!((second.from, second.to), (1003, 1003));
        assert_ne!(first.submission_id, second.submission_id);

        let persisted = reopened.load().expect("state loads");
        assert_eq!(persisted.next_identifier, 1004);
        assert_eq!(persisted.submissions.len(), 2);
    }

    #[test]
    fn unknown_user_is_an_authentication_failure() {
        let path = temp_registry("auth", &state());
        let mut registry =
            FileRegistry::open(&path, Credentials::new("stranger", "pw")).expect("open");
        assert!(matches!(
            registry.request_range(1),
            Err(RegistryError::Authentication(_))
        ));
        assert_eq!(registry.load().expect("state").next_identifier, 1000);
    }

    #[test]
    fn empty_password_is_rejected() {
        let path = temp_registry("nopass", &state());
        let mut registry =
            FileRegistry::open(&path, Credentials::new("curator", "")).expect("open");
        assert!(matches!(
            registry.request_range(1),
            Err(RegistryError::Authentication(_))
        ));
    }

    #[test]
    fn lookup_matches_equivalent_reference_forms() {
        let mut seeded = state();
        seeded.records.push(RegistryRecord {
            external_ref: "pubmed:123".to_string(),
            imex_id: Some(ImexId::new(77).expect("non-zero id")),
            owner: "MINT".to_string(),
        });
        let path = temp_registry("lookup", &seeded);
        let mut registry = FileRegistry::open(&path, curator()).expect("open");

        let found = registry
            .lookup_publication(&ExternalRef::Pubmed(123))
            .expect("lookup succeeds")
            .expect("record exists");
        assert_eq!(found.owner, "MINT");
        assert!(
            registry
                .lookup_publication(&ExternalRef::Pubmed(124))
                .expect("lookup succeeds")
                .is_none()
        );
    }

    #[test]
    fn held_lock_is_a_retryable_busy_error() {
        let path = temp_registry("busy", &state());
        let lock = sibling(&path, ".lock");
        fs::write(&lock, "pid=0\n").expect("lock written");

        let mut registry = FileRegistry::open(&path, curator()).expect("open");
        match registry.request_range(1) {
            Err(err @ RegistryError::Transport(_)) => {
                assert!(err.is_retryable());
                assert!(err.to_string().contains("lock busy"));
            }
            other => panic!("expected busy lock, got {other:?}"),
        }
        assert_eq!(registry.load().expect("state").next_identifier, 1000);

        fs::remove_file(&lock).expect("lock removed");
        assert_eq!(registry.request_range(1).expect("range").from, 1000);
        assert!(!lock.exists());
    }

    #[test]
    fn concurrent_handles_never_share_an_identifier() {
        const PER_HANDLE: usize = 100;
        let path = temp_registry("concurrent", &state());

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut registry = FileRegistry::open(&path, curator()).expect("open");
                    let mut issued = Vec::with_capacity(PER_HANDLE);
                    while issued.len() < PER_HANDLE {
                        match registry.request_range(1) {
                            Ok(range) => issued.push(range.from),
                            Err(RegistryError::Transport(_)) => std::thread::yield_now(),
                            Err(other) => panic!("unexpected registry error: {other}"),
                        }
                    }
                    issued
                })
            })
            .collect();

        let mut all: Vec<u64> = workers
            .into_iter()
            .flat_map(|worker| worker.join().expect("worker finished"))
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 2 * PER_HANDLE);
        assert_eq!(all.first(), Some(&1000));
        assert_eq!(all.last(), Some(&(1000 + 2 * PER_HANDLE as u64 - 1)));

        let persisted = FileRegistry::read_state(&path).expect("state loads");
        assert_eq!(persisted.next_identifier, 1000 + 2 * PER_HANDLE as u64);
        assert_eq!(persisted.submissions.len(), 2 * PER_HANDLE);
    }

    #[test]
    fn missing_file_is_a_transport_error() {
        let path = std::env::temp_dir().join("imex-registry-definitely-missing.json");
        assert!(matches!(
            FileRegistry::open(&path, curator()),
            Err(RegistryError::Transport(_))
        ));
    }
}
