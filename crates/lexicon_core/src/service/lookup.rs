//! Batched lookup of one actor's existing votes.
//!
//! # Responsibility
//! - Answer "which of these definitions has this actor voted on" for a whole
//!   list load.
//! - Partition arbitrarily long id lists to fit the store's membership limit.
//!
//! # Invariants
//! - Every store call carries between 1 and `MAX_LOOKUP_BATCH` ids.
//! - Unvoted definitions are absent from the result, never mapped to zero.
//! - Empty input returns an empty map without touching the store.

use crate::model::actor::ActorId;
use crate::model::definition::DefinitionId;
use crate::model::vote::VoteValue;
use crate::repo::vote_repo::{VoteLedger, MAX_LOOKUP_BATCH};
use crate::repo::RepoResult;
use log::debug;
use std::collections::{BTreeMap, HashSet};

/// Actor's votes keyed by definition.
pub type VoteMap = BTreeMap<DefinitionId, VoteValue>;

/// Chunking lookup over a vote ledger.
pub struct BatchVoteLookup<L: VoteLedger> {
    ledger: L,
    batch_size: usize,
}

impl<L: VoteLedger> BatchVoteLookup<L> {
    /// Creates a lookup using the store's full batch limit.
    pub fn new(ledger: L) -> Self {
        Self::with_batch_size(ledger, MAX_LOOKUP_BATCH)
    }

    /// Creates a lookup with a smaller batch size; clamped to `1..=10`.
    pub fn with_batch_size(ledger: L, batch_size: usize) -> Self {
        Self {
            ledger,
            batch_size: batch_size.clamp(1, MAX_LOOKUP_BATCH),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the actor's vote for each id it has voted on.
    ///
    /// Duplicate ids are looked up once. Store errors propagate unchanged and
    /// discard results from chunks that already completed.
    pub fn lookup_votes(
        &self,
        actor_id: &ActorId,
        definition_ids: &[DefinitionId],
    ) -> RepoResult<VoteMap> {
        let mut seen = HashSet::with_capacity(definition_ids.len());
        let unique: Vec<DefinitionId> = definition_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let mut votes = VoteMap::new();
        if unique.is_empty() {
            return Ok(votes);
        }

        let mut chunks = 0_usize;
        for chunk in unique.chunks(self.batch_size) {
            votes.extend(self.ledger.votes_in_batch(actor_id, chunk)?);
            chunks += 1;
        }

        debug!(
            "event=vote_lookup module=service status=ok actor={} ids={} chunks={} hits={}",
            actor_id.log_prefix(),
            unique.len(),
            chunks,
            votes.len()
        );
        Ok(votes)
    }
}
