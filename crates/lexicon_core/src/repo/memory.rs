//! In-memory ledger and aggregator pair.
//!
//! Mirrors the SQLite semantics (conditional ledger writes, additive counter
//! deltas, non-negative counts, insertion-order tie breaking) so service code
//! can run without a database handle.

use crate::model::actor::ActorId;
use crate::model::definition::{Definition, DefinitionId, NewDefinition, Tally};
use crate::model::vote::{LedgerEffect, TallyDelta, VoteRecord, VoteTransition, VoteValue};
use crate::repo::definition_repo::{DefinitionListQuery, ScoreAggregator};
use crate::repo::vote_repo::{check_batch_len, VoteLedger};
use crate::repo::{RepoError, RepoResult};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

type VoteKey = (ActorId, DefinitionId);

/// Thread-safe in-memory vote ledger.
#[derive(Debug, Default)]
pub struct InMemoryVoteLedger {
    records: Mutex<BTreeMap<VoteKey, VoteRecord>>,
}

impl InMemoryVoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records across all definitions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<VoteKey, VoteRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VoteLedger for InMemoryVoteLedger {
    fn current_vote(
        &self,
        actor_id: &ActorId,
        definition_id: DefinitionId,
    ) -> RepoResult<Option<VoteValue>> {
        Ok(self
            .lock()
            .get(&(actor_id.clone(), definition_id))
            .map(|record| record.value))
    }

    fn apply_transition(
        &self,
        actor_id: &ActorId,
        definition_id: DefinitionId,
        transition: &VoteTransition,
    ) -> RepoResult<()> {
        let mut records = self.lock();
        let key = (actor_id.clone(), definition_id);
        let stored = records.get(&key).map(|record| record.value);
        if stored != transition.prior {
            return Err(RepoError::StaleVote(definition_id));
        }

        let now = now_epoch_ms();
        match transition.effect {
            LedgerEffect::Insert(value) => {
                records.insert(
                    key,
                    VoteRecord {
                        actor_id: actor_id.clone(),
                        definition_id,
                        value,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
            LedgerEffect::Update(value) => {
                if let Some(record) = records.get_mut(&key) {
                    record.value = value;
                    record.updated_at = now;
                }
            }
            LedgerEffect::Delete => {
                records.remove(&key);
            }
        }
        Ok(())
    }

    fn votes_in_batch(
        &self,
        actor_id: &ActorId,
        definition_ids: &[DefinitionId],
    ) -> RepoResult<Vec<(DefinitionId, VoteValue)>> {
        check_batch_len(definition_ids.len())?;
        let records = self.lock();
        Ok(definition_ids
            .iter()
            .filter_map(|id| {
                records
                    .get(&(actor_id.clone(), *id))
                    .map(|record| (*id, record.value))
            })
            .collect())
    }

    fn votes_for_definition(&self, definition_id: DefinitionId) -> RepoResult<Vec<VoteRecord>> {
        Ok(self
            .lock()
            .values()
            .filter(|record| record.definition_id == definition_id)
            .cloned()
            .collect())
    }
}

/// Thread-safe in-memory score aggregator holding definitions in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryScoreAggregator {
    definitions: Mutex<Vec<Definition>>,
}

impl InMemoryScoreAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a definition with zeroed counters.
    pub fn insert_definition(&self, request: &NewDefinition) -> RepoResult<DefinitionId> {
        let normalized = request.normalized()?;
        let mut definitions = self.lock();
        if definitions.iter().any(|existing| existing.id == normalized.id) {
            return Err(RepoError::InvalidData(format!(
                "definition {} already exists",
                normalized.id
            )));
        }

        definitions.push(Definition {
            id: normalized.id,
            word_id: normalized.word_id,
            author_id: normalized.author_id,
            author_name: normalized.author_name,
            text: normalized.text,
            example: normalized.example,
            created_at: now_epoch_ms(),
            tally: Tally::ZERO,
        });
        Ok(normalized.id)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Definition>> {
        self.definitions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScoreAggregator for InMemoryScoreAggregator {
    fn apply_delta(&self, definition_id: DefinitionId, delta: TallyDelta) -> RepoResult<()> {
        let mut definitions = self.lock();
        let definition = definitions
            .iter_mut()
            .find(|definition| definition.id == definition_id)
            .ok_or(RepoError::NotFound(definition_id))?;

        definition.tally = definition.tally.checked_apply(delta).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "counter delta {delta:?} would make definition {definition_id} negative"
            ))
        })?;
        Ok(())
    }

    fn tally(&self, definition_id: DefinitionId) -> RepoResult<Option<Tally>> {
        Ok(self
            .lock()
            .iter()
            .find(|definition| definition.id == definition_id)
            .map(|definition| definition.tally))
    }

    fn get_definition(&self, definition_id: DefinitionId) -> RepoResult<Option<Definition>> {
        Ok(self
            .lock()
            .iter()
            .find(|definition| definition.id == definition_id)
            .cloned())
    }

    fn list_by_score(&self, query: &DefinitionListQuery) -> RepoResult<Vec<Definition>> {
        let definitions = self.lock();
        let mut ordered: Vec<&Definition> = definitions.iter().collect();
        // Stable sort keeps insertion order for equal scores.
        ordered.sort_by(|a, b| b.tally.score.cmp(&a.tally.score));
        Ok(query.select(ordered.into_iter()))
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::{InMemoryScoreAggregator, InMemoryVoteLedger};
    use crate::model::actor::ActorId;
    use crate::model::definition::NewDefinition;
    use crate::model::vote::{vote_transition, TallyDelta, VoteValue};
    use crate::repo::definition_repo::ScoreAggregator;
    use crate::repo::vote_repo::VoteLedger;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn stale_prior_is_rejected() {
        let ledger = InMemoryVoteLedger::new();
        let actor = ActorId::parse("u1").unwrap();
        let item = Uuid::new_v4();

        let first = vote_transition(None, VoteValue::Up);
        ledger.apply_transition(&actor, item, &first).unwrap();
        let err = ledger.apply_transition(&actor, item, &first).unwrap_err();
        assert!(matches!(err, RepoError::StaleVote(id) if id == item));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn negative_counts_are_rejected_without_partial_update() {
        let aggregator = InMemoryScoreAggregator::new();
        let id = aggregator
            .insert_definition(&NewDefinition::new(Uuid::new_v4(), "a", "text", "example"))
            .unwrap();

        let err = aggregator
            .apply_delta(id, TallyDelta::new(-1, 0))
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
        assert_eq!(aggregator.tally(id).unwrap().unwrap().score, 0);
    }
}
