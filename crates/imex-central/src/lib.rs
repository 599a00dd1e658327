//! # imex-central
//!
//! Client side of the central IMEx registry:
//!
//! - `KeyAssigner`: the one authenticated capability the engine needs
//!   (reserve a range, look up a publication)
//! - `RangeAllocator`: batches reservations and hands out single identifiers
//! - `FileRegistry`: a JSON-file registry for local runs
//!
//! Retry policy is not here: the allocator surfaces every remote failure
//! once and lets its owner decide.

pub mod allocator;
pub mod file_registry;
pub mod registry;

pub use allocator::{AllocationError, DEFAULT_BATCH_SIZE, RangeAllocator};
pub use file_registry::{FileRegistry, RegistryState, SubmissionEntry};
pub use registry::{Credentials, KeyAssigner, RegistryError};
