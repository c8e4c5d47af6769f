//! Optimistic client-side projection of a score-ordered definition list.
//!
//! # Responsibility
//! - Track the local actor's tri-state vote per listed definition.
//! - Apply a vote locally (counters, user vote, re-sort) without waiting for
//!   the store round trip.
//! - Let the next authoritative read overwrite the projection.
//!
//! # Invariants
//! - Re-voting the direction already shown is swallowed, not projected.
//! - Without a signed-in actor nothing is projected.
//! - Counter changes come from the shared transition table only.
//! - After every mutation the list is sorted by score descending, with the
//!   previous relative order kept for equal scores.

use crate::model::definition::{Definition, DefinitionId, Tally};
use crate::model::vote::{vote_transition, VoteTransition, VoteValue};
use crate::service::lookup::VoteMap;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Local actor's vote on one listed definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserVote {
    /// Not looked up yet.
    #[default]
    Unknown,
    /// Looked up; the actor has no vote.
    NoVote,
    Voted(VoteValue),
}

impl UserVote {
    /// Prior vote fed into the transition table; `Unknown` counts as none.
    pub fn as_prior(self) -> Option<VoteValue> {
        match self {
            Self::Voted(value) => Some(value),
            Self::Unknown | Self::NoVote => None,
        }
    }
}

/// Render state of the up/down control pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteControls {
    pub score: i64,
    pub up_pressed: bool,
    pub down_pressed: bool,
    pub up_enabled: bool,
    pub down_enabled: bool,
}

/// One row of the local list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedDefinition {
    pub definition: Definition,
    pub user_vote: UserVote,
}

/// Result of one optimistic vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticUpdate {
    pub definition_id: DefinitionId,
    pub transition: VoteTransition,
    pub tally: Tally,
    pub from_index: usize,
    pub to_index: usize,
}

impl OptimisticUpdate {
    pub fn reordered(&self) -> bool {
        self.from_index != self.to_index
    }
}

/// Pending animated layout change produced by a re-sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutChange {
    pub previous_order: Vec<DefinitionId>,
    pub current_order: Vec<DefinitionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileError {
    /// No signed-in actor; the list was left untouched.
    AuthRequired,
    /// Definition is not part of the local list.
    NotListed(DefinitionId),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthRequired => write!(f, "you must be logged in to vote"),
            Self::NotListed(id) => write!(f, "definition is not in the local list: {id}"),
        }
    }
}

impl Error for ReconcileError {}

/// Local list state for one view.
#[derive(Debug, Clone, Default)]
pub struct ClientReconciler {
    items: Vec<ListedDefinition>,
    signed_in: bool,
    layout_change: Option<LayoutChange>,
}

impl ClientReconciler {
    pub fn new(signed_in: bool) -> Self {
        Self {
            signed_in,
            ..Self::default()
        }
    }

    pub fn set_signed_in(&mut self, signed_in: bool) {
        self.signed_in = signed_in;
    }

    pub fn items(&self) -> &[ListedDefinition] {
        &self.items
    }

    /// Current display order.
    pub fn order(&self) -> Vec<DefinitionId> {
        self.items.iter().map(|item| item.definition.id).collect()
    }

    pub fn get(&self, definition_id: DefinitionId) -> Option<&ListedDefinition> {
        self.items
            .iter()
            .find(|item| item.definition.id == definition_id)
    }

    pub fn user_vote(&self, definition_id: DefinitionId) -> Option<UserVote> {
        self.get(definition_id).map(|item| item.user_vote)
    }

    /// Control state; voting is disabled without an actor, and a pressed
    /// direction cannot be pressed again.
    pub fn controls(&self, definition_id: DefinitionId) -> Option<VoteControls> {
        self.get(definition_id).map(|item| {
            let up_pressed = item.user_vote == UserVote::Voted(VoteValue::Up);
            let down_pressed = item.user_vote == UserVote::Voted(VoteValue::Down);
            VoteControls {
                score: item.definition.tally.score,
                up_pressed,
                down_pressed,
                up_enabled: self.signed_in && !up_pressed,
                down_enabled: self.signed_in && !down_pressed,
            }
        })
    }

    /// Replaces the list with an authoritative read.
    ///
    /// Projected counters are discarded. Known user votes of definitions that
    /// stay listed are kept until the next lookup; new ones start `Unknown`.
    pub fn load_authoritative(&mut self, definitions: Vec<Definition>) {
        let previous_order = self.order();
        let known: HashMap<DefinitionId, UserVote> = self
            .items
            .iter()
            .filter(|item| item.user_vote != UserVote::Unknown)
            .map(|item| (item.definition.id, item.user_vote))
            .collect();
        self.items = definitions
            .into_iter()
            .map(|definition| ListedDefinition {
                user_vote: known
                    .get(&definition.id)
                    .copied()
                    .unwrap_or_default(),
                definition,
            })
            .collect();
        self.sort_by_score();
        self.record_layout_change(previous_order);
    }

    /// Fills user votes from a batched lookup; unlisted ids are ignored.
    pub fn apply_vote_lookup(&mut self, votes: &VoteMap) {
        for item in &mut self.items {
            item.user_vote = match votes.get(&item.definition.id) {
                Some(value) => UserVote::Voted(*value),
                None => UserVote::NoVote,
            };
        }
    }

    /// Overwrites one definition's counters with an authoritative tally.
    pub fn apply_authoritative_tally(
        &mut self,
        definition_id: DefinitionId,
        tally: Tally,
    ) -> Result<(), ReconcileError> {
        let previous_order = self.order();
        let item = self
            .items
            .iter_mut()
            .find(|item| item.definition.id == definition_id)
            .ok_or(ReconcileError::NotListed(definition_id))?;
        item.definition.tally = tally;
        self.sort_by_score();
        self.record_layout_change(previous_order);
        Ok(())
    }

    /// Projects a vote locally.
    ///
    /// Returns `Ok(None)` when the shown vote already equals `value`.
    pub fn apply_optimistic(
        &mut self,
        definition_id: DefinitionId,
        value: VoteValue,
    ) -> Result<Option<OptimisticUpdate>, ReconcileError> {
        if !self.signed_in {
            return Err(ReconcileError::AuthRequired);
        }
        let previous_order = self.order();
        let from_index = previous_order
            .iter()
            .position(|id| *id == definition_id)
            .ok_or(ReconcileError::NotListed(definition_id))?;

        let item = &mut self.items[from_index];
        if item.user_vote == UserVote::Voted(value) {
            return Ok(None);
        }

        let transition = vote_transition(item.user_vote.as_prior(), value);
        item.definition.tally = item.definition.tally.saturating_apply(transition.delta);
        item.user_vote = UserVote::Voted(value);
        let tally = item.definition.tally;

        self.sort_by_score();
        let to_index = self
            .items
            .iter()
            .position(|item| item.definition.id == definition_id)
            .unwrap_or(from_index);
        self.record_layout_change(previous_order);

        Ok(Some(OptimisticUpdate {
            definition_id,
            transition,
            tally,
            from_index,
            to_index,
        }))
    }

    /// Takes the layout change of the latest mutation, if it moved the order.
    pub fn take_layout_change(&mut self) -> Option<LayoutChange> {
        self.layout_change.take()
    }

    fn sort_by_score(&mut self) {
        self.items
            .sort_by(|a, b| b.definition.tally.score.cmp(&a.definition.tally.score));
    }

    fn record_layout_change(&mut self, previous_order: Vec<DefinitionId>) {
        let current_order = self.order();
        self.layout_change = (current_order != previous_order).then(|| LayoutChange {
            previous_order,
            current_order,
        });
    }
}
