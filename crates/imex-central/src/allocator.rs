//! Range allocation: one remote reservation serves many identifiers.

use imex_kernel::{IdentifierRange, ImexId};
use tracing::{debug, info};

use crate::registry::{KeyAssigner, RegistryError};

pub const DEFAULT_BATCH_SIZE: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("identifier count must be positive (got {0})")]
    InvalidCount(u64),

    #[error("registry returned unusable range [{from}, {to}] for {requested} identifier(s)")]
    InvalidRange { from: u64, to: u64, requested: u64 },

    #[error("held range still has {remaining} identifier(s); refusing to acquire another")]
    RangeNotExhausted { remaining: u64 },

    #[error("allocation failed: {0}")]
    AllocationFailed(#[source] RegistryError),
}

impl AllocationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AllocationError::AllocationFailed(err) if err.is_retryable())
    }
}

#[derive(Debug, Clone)]
struct HeldRange {
    range: IdentifierRange,
    next_offset: u64,
}

impl HeldRange {
    fn remaining(&self) -> u64 {
        self.range.len().saturating_sub(self.next_offset)
    }
}

/// Hands out identifiers from the most recently reserved range.
///
/// Owned by exactly one coordinator. Identifiers are handed out at most once:
/// the cursor only moves forward, and a discarded or failed range is never
/// revisited.
#[derive(Debug)]
pub struct RangeAllocator<A> {
    assigner: A,
    batch_size: u64,
    held: Option<HeldRange>,
    acquire_calls: u64,
    issued: u64,
}

impl<A: KeyAssigner> RangeAllocator<A> {
    pub fn new(assigner: A, batch_size: u64) -> Result<Self, AllocationError> {
        if batch_size == 0 {
            return Err(AllocationError::InvalidCount(batch_size));
        }
        Ok(Self {
            assigner,
            batch_size,
            held: None,
            acquire_calls: 0,
            issued: 0,
        })
    }

    /// Reserve a new range of at least `count` identifiers and hold it.
    ///
    /// Only legal once the held range is exhausted. The allocator makes one
    /// remote call and never retries.
    pub fn acquire(&mut self, count: u64) -> Result<IdentifierRange, AllocationError> {
        if count == 0 {
            return Err(AllocationError::InvalidCount(count));
        }
        let remaining = self.remaining();
        if remaining > 0 {
            return Err(AllocationError::RangeNotExhausted { remaining });
        }
        self.held = None;
        let range = self.reserve(count)?;
        self.held = Some(HeldRange {
            range: range.clone(),
            next_offset: 0,
        });
        Ok(range)
    }

    /// Next unissued identifier, reserving a new batch only when needed.
    pub fn next_id(&mut self) -> Result<ImexId, AllocationError> {
        let mut held = match self.held.take() {
            Some(held) if held.remaining() > 0 => held,
            _ => HeldRange {
                range: self.reserve(self.batch_size)?,
                next_offset: 0,
            },
        };

        let offset = held.next_offset;
        let Some(Ok(id)) = held.range.nth(offset) else {
            return Err(AllocationError::InvalidRange {
                from: held.range.from,
                to: held.range.to,
                requested: offset + 1,
            });
        };
        held.next_offset += 1;
        self.issued += 1;
        debug!(imex_id = %id, remaining = held.remaining(), "issued identifier");
        self.held = Some(held);
        Ok(id)
    }

    fn reserve(&mut self, count: u64) -> Result<IdentifierRange, AllocationError> {
        self.acquire_calls += 1;
        let range = self
            .assigner
            .request_range(count)
            .map_err(AllocationError::AllocationFailed)?;

        if range.from == 0 || range.len() < count {
            return Err(AllocationError::InvalidRange {
                from: range.from,
                to: range.to,
                requested: count,
            });
        }

        info!(
            submission = %range.submission_id,
            from = range.from,
            to = range.to,
            partner = %range.partner,
            "acquired identifier range"
        );
        Ok(range)
    }

    /// Identifiers left in the held range.
    pub fn remaining(&self) -> u64 {
        self.held.as_ref().map(HeldRange::remaining).unwrap_or(0)
    }

    /// The held range, if any.
    pub fn held_range(&self) -> Option<&IdentifierRange> {
        self.held.as_ref().map(|held| &held.range)
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Remote reservations attempted, successful or not.
    pub fn acquire_calls(&self) -> u64 {
        self.acquire_calls
    }

    /// Identifiers handed out.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn registry(&self) -> &A {
        &self.assigner
    }

    /// The underlying registry, for lookups that do not touch the range.
    pub fn registry_mut(&mut self) -> &mut A {
        &mut self.assigner
    }
}
