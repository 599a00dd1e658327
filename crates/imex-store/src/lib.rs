//! # imex-store
//!
//! Curation datastore layer consumed by the IMEx engine.
//!
//! This crate provides:
//! - the `CurationStore` contract (read a publication, attach xrefs,
//!   iterate evidence records)
//! - `MemoryStore` (canonical in-memory state)
//! - JSONL read/write and a lock-scoped `JsonlStore` over it
//!
//! ## Data model
//!
//! ```text
//! JSONL (on disk, one line per publication)
//!     ↕  load / lock-scoped mutate
//! MemoryStore (deterministic in-memory projection)
//! ```

pub mod atomic_store;
pub mod contract;
pub mod file_store;
pub mod jsonl;
pub mod memory;

pub use atomic_store::{mutate_store_jsonl, store_lock_path};
pub use contract::{CurationStore, PrimaryWrite, StoreError, place_primary};
pub use file_store::JsonlStore;
pub use jsonl::{
    JsonlError, read_publications, read_publications_from_path, write_publications,
    write_publications_to_path,
};
pub use memory::{MemoryStore, STORE_SNAPSHOT_REF_PREFIX};
