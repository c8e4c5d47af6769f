//! Vote casting use-case service.
//!
//! # Responsibility
//! - Gate casts on an authenticated actor.
//! - Resolve the prior vote through the shared transition table and drive the
//!   ledger write followed by the counter write.
//! - Expose the read paths (tally, score-ordered lists, batched vote lookup).
//!
//! # Invariants
//! - Anonymous casts fail before any store is touched.
//! - Split casts write the ledger first; a failed counter write is reported as
//!   `ItemNotFound` or `PartialWriteDivergence` and is never rolled back.
//! - Errors are returned to the caller uninterpreted; nothing is retried.

use crate::config::EngineConfig;
use crate::model::actor::{Actor, ActorId};
use crate::model::definition::{Definition, DefinitionId, Tally};
use crate::model::vote::{vote_transition, VoteTransition, VoteValue};
use crate::repo::definition_repo::{DefinitionListQuery, ScoreAggregator};
use crate::repo::vote_repo::{VoteLedger, MAX_LOOKUP_BATCH};
use crate::repo::vote_store::SqliteVoteStore;
use crate::repo::{RepoError, RepoResult};
use crate::service::lookup::{BatchVoteLookup, VoteMap};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type VoteResult<T> = Result<T, VoteError>;

/// Errors surfaced to the vote action handler.
#[derive(Debug)]
pub enum VoteError {
    /// No authenticated actor; nothing was written.
    AuthRequired,
    /// Target definition does not exist. In split mode the ledger record may
    /// already have been written.
    ItemNotFound(DefinitionId),
    /// Ledger write succeeded but the counter write failed; stores diverged.
    PartialWriteDivergence {
        definition_id: DefinitionId,
        applied: VoteTransition,
        source: RepoError,
    },
    /// Store failure before any write was applied, or on a read path.
    Repo(RepoError),
}

impl Display for VoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthRequired => write!(f, "you must be logged in to vote"),
            Self::ItemNotFound(id) => write!(f, "definition not found: {id}"),
            Self::PartialWriteDivergence {
                definition_id,
                applied,
                source,
            } => write!(
                f,
                "vote on definition {definition_id} recorded ({}) but counters were not updated: {source}",
                applied.kind()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PartialWriteDivergence { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            Self::AuthRequired | Self::ItemNotFound(_) => None,
        }
    }
}

impl From<RepoError> for VoteError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::ItemNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Vote engine facade over an explicit ledger/aggregator pair.
pub struct VoteService<L: VoteLedger, A: ScoreAggregator> {
    ledger: L,
    aggregator: A,
    lookup_batch_size: usize,
}

impl<L: VoteLedger, A: ScoreAggregator> VoteService<L, A> {
    /// Creates a service using the provided stores.
    pub fn new(ledger: L, aggregator: A) -> Self {
        Self {
            ledger,
            aggregator,
            lookup_batch_size: MAX_LOOKUP_BATCH,
        }
    }

    /// Creates a service honoring config tunables.
    pub fn with_config(ledger: L, aggregator: A, config: &EngineConfig) -> Self {
        Self {
            ledger,
            aggregator,
            lookup_batch_size: config.lookup_batch_size,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn aggregator(&self) -> &A {
        &self.aggregator
    }

    /// Casts `value` on a definition as two independent writes.
    ///
    /// # Contract
    /// - Same direction as the recorded vote retracts it.
    /// - Opposite direction switches it; no prior vote inserts one.
    /// - Returns unit; callers re-read the tally or project the delta locally.
    pub fn cast_vote(
        &self,
        actor: Option<&Actor>,
        definition_id: DefinitionId,
        value: VoteValue,
    ) -> VoteResult<()> {
        let started_at = Instant::now();
        let actor = require_actor(actor, definition_id)?;

        let prior = self.ledger.current_vote(&actor.id, definition_id)?;
        let transition = vote_transition(prior, value);
        self.ledger
            .apply_transition(&actor.id, definition_id, &transition)?;

        match self.aggregator.apply_delta(definition_id, transition.delta) {
            Ok(()) => {
                log_cast(&actor.id, definition_id, &transition, "split", started_at);
                Ok(())
            }
            Err(RepoError::NotFound(id)) => {
                warn!(
                    "event=vote_cast module=service status=error mode=split error_code=item_not_found definition={} actor={}",
                    id,
                    actor.id.log_prefix()
                );
                Err(VoteError::ItemNotFound(id))
            }
            Err(source) => {
                error!(
                    "event=vote_cast module=service status=error mode=split error_code=partial_write_divergence definition={} transition={} error={}",
                    definition_id,
                    transition.kind(),
                    source
                );
                Err(VoteError::PartialWriteDivergence {
                    definition_id,
                    applied: transition,
                    source,
                })
            }
        }
    }

    /// Reads the current counters of one definition.
    pub fn tally(&self, definition_id: DefinitionId) -> VoteResult<Tally> {
        self.aggregator
            .tally(definition_id)?
            .ok_or(VoteError::ItemNotFound(definition_id))
    }

    /// Lists definitions ordered by score descending.
    pub fn list_by_score(&self, query: &DefinitionListQuery) -> RepoResult<Vec<Definition>> {
        self.aggregator.list_by_score(query)
    }

    /// Looks up the actor's existing votes for a list load.
    pub fn lookup_votes(
        &self,
        actor_id: &ActorId,
        definition_ids: &[DefinitionId],
    ) -> RepoResult<VoteMap> {
        BatchVoteLookup::with_batch_size(&self.ledger, self.lookup_batch_size)
            .lookup_votes(actor_id, definition_ids)
    }
}

/// Casts `value` with both writes in a single SQLite transaction.
///
/// A missing definition leaves no ledger record behind.
pub fn cast_vote_atomic(
    store: &mut SqliteVoteStore<'_>,
    actor: Option<&Actor>,
    definition_id: DefinitionId,
    value: VoteValue,
) -> VoteResult<()> {
    let started_at = Instant::now();
    let actor = require_actor(actor, definition_id)?;

    match store.cast_vote(&actor.id, definition_id, value) {
        Ok(transition) => {
            log_cast(&actor.id, definition_id, &transition, "atomic", started_at);
            Ok(())
        }
        Err(err) => {
            warn!(
                "event=vote_cast module=service status=error mode=atomic definition={} error={}",
                definition_id, err
            );
            Err(err.into())
        }
    }
}

fn require_actor(actor: Option<&Actor>, definition_id: DefinitionId) -> VoteResult<&Actor> {
    actor.ok_or_else(|| {
        warn!(
            "event=vote_cast module=service status=error error_code=auth_required definition={}",
            definition_id
        );
        VoteError::AuthRequired
    })
}

fn log_cast(
    actor_id: &ActorId,
    definition_id: DefinitionId,
    transition: &VoteTransition,
    mode: &str,
    started_at: Instant,
) {
    info!(
        "event=vote_cast module=service status=ok mode={} transition={} definition={} actor={} score_delta={} duration_ms={}",
        mode,
        transition.kind(),
        definition_id,
        actor_id.log_prefix(),
        transition.delta.score,
        started_at.elapsed().as_millis()
    );
}
