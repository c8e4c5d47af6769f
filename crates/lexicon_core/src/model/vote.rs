//! Vote values, ledger records and the shared transition table.
//!
//! # Responsibility
//! - Define the directional vote value stored by the ledger.
//! - Own the single `(prior, requested) -> transition` table consumed by both
//!   the server write path and the client optimistic projection.
//!
//! # Invariants
//! - A stored vote is always `+1` or `-1`; "no vote" is the absence of a record.
//! - Re-casting the recorded direction is a retraction, never a no-op.
//! - Every transition keeps `score_delta == upvotes_delta - downvotes_delta`.

use crate::model::actor::ActorId;
use crate::model::definition::DefinitionId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Directional vote value.
///
/// Serialized as the integers `1` / `-1` to match the stored shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    /// Signed contribution of this vote to an item score.
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        value.as_i8()
    }
}

impl From<VoteValue> for i64 {
    fn from(value: VoteValue) -> Self {
        i64::from(value.as_i8())
    }
}

impl TryFrom<i8> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(InvalidVoteValue(other)),
        }
    }
}

impl Display for VoteValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "+1"),
            Self::Down => write!(f, "-1"),
        }
    }
}

/// Raised when an integer is neither `1` nor `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidVoteValue(pub i64);

impl Display for InvalidVoteValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "vote value must be 1 or -1, got {}", self.0)
    }
}

impl Error for InvalidVoteValue {}

/// One live ledger entry: actor `actor_id` holds `value` on `definition_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub actor_id: ActorId,
    pub definition_id: DefinitionId,
    pub value: VoteValue,
    /// Epoch ms of the first cast.
    pub created_at: i64,
    /// Epoch ms of the last direction change.
    pub updated_at: i64,
}

/// Mutation the ledger must apply to the `(actor, item)` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    Insert(VoteValue),
    Update(VoteValue),
    Delete,
}

/// Additive adjustment to an item's `(upvotes, downvotes, score)` counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TallyDelta {
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

impl TallyDelta {
    pub const ZERO: Self = Self {
        upvotes: 0,
        downvotes: 0,
        score: 0,
    };

    pub fn new(upvotes: i64, downvotes: i64) -> Self {
        Self {
            upvotes,
            downvotes,
            score: upvotes - downvotes,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// Outcome of the transition table for one cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub prior: Option<VoteValue>,
    pub requested: VoteValue,
    pub effect: LedgerEffect,
    pub delta: TallyDelta,
}

impl VoteTransition {
    /// Vote held after the transition is applied.
    pub fn resulting_vote(&self) -> Option<VoteValue> {
        match self.effect {
            LedgerEffect::Insert(value) | LedgerEffect::Update(value) => Some(value),
            LedgerEffect::Delete => None,
        }
    }

    /// Stable name used in log events.
    pub fn kind(&self) -> &'static str {
        match self.effect {
            LedgerEffect::Insert(_) => "new",
            LedgerEffect::Update(_) => "switch",
            LedgerEffect::Delete => "retract",
        }
    }
}

/// Resolves a cast against the prior vote.
///
/// | prior | requested | effect     | delta (up, down, score) |
/// |-------|-----------|------------|-------------------------|
/// | none  | +1        | insert(+1) | (+1, 0, +1)             |
/// | none  | -1        | insert(-1) | (0, +1, -1)             |
/// | +1    | +1        | delete     | (-1, 0, -1)             |
/// | -1    | -1        | delete     | (0, -1, +1)             |
/// | +1    | -1        | update(-1) | (-1, +1, -2)            |
/// | -1    | +1        | update(+1) | (+1, -1, +2)            |
pub fn vote_transition(prior: Option<VoteValue>, requested: VoteValue) -> VoteTransition {
    let (effect, delta) = match (prior, requested) {
        (None, VoteValue::Up) => (LedgerEffect::Insert(VoteValue::Up), TallyDelta::new(1, 0)),
        (None, VoteValue::Down) => (
            LedgerEffect::Insert(VoteValue::Down),
            TallyDelta::new(0, 1),
        ),
        (Some(VoteValue::Up), VoteValue::Up) => (LedgerEffect::Delete, TallyDelta::new(-1, 0)),
        (Some(VoteValue::Down), VoteValue::Down) => {
            (LedgerEffect::Delete, TallyDelta::new(0, -1))
        }
        (Some(VoteValue::Up), VoteValue::Down) => (
            LedgerEffect::Update(VoteValue::Down),
            TallyDelta::new(-1, 1),
        ),
        (Some(VoteValue::Down), VoteValue::Up) => (
            LedgerEffect::Update(VoteValue::Up),
            TallyDelta::new(1, -1),
        ),
    };

    VoteTransition {
        prior,
        requested,
        effect,
        delta,
    }
}

#[cfg(test)]
mod tests {
    use super::{vote_transition, LedgerEffect, TallyDelta, VoteValue};

    fn delta(up: i64, down: i64, score: i64) -> TallyDelta {
        TallyDelta {
            upvotes: up,
            downvotes: down,
            score,
        }
    }

    #[test]
    fn transition_table_matches_all_six_rows() {
        use VoteValue::{Down, Up};
        let rows = [
            (None, Up, LedgerEffect::Insert(Up), delta(1, 0, 1)),
            (None, Down, LedgerEffect::Insert(Down), delta(0, 1, -1)),
            (Some(Up), Up, LedgerEffect::Delete, delta(-1, 0, -1)),
            (Some(Down), Down, LedgerEffect::Delete, delta(0, -1, 1)),
            (Some(Up), Down, LedgerEffect::Update(Down), delta(-1, 1, -2)),
            (Some(Down), Up, LedgerEffect::Update(Up), delta(1, -1, 2)),
        ];

        for (prior, requested, effect, expected) in rows {
            let transition = vote_transition(prior, requested);
            assert_eq!(transition.effect, effect, "{prior:?} -> {requested:?}");
            assert_eq!(transition.delta, expected, "{prior:?} -> {requested:?}");
        }
    }

    #[test]
    fn repeated_direction_is_retraction_not_noop() {
        let transition = vote_transition(Some(VoteValue::Up), VoteValue::Up);
        assert_eq!(transition.resulting_vote(), None);
        assert!(!transition.delta.is_zero());
        assert_eq!(transition.kind(), "retract");
    }

    #[test]
    fn score_delta_equals_new_minus_prior_contribution() {
        for prior in [None, Some(VoteValue::Up), Some(VoteValue::Down)] {
            for requested in [VoteValue::Up, VoteValue::Down] {
                let transition = vote_transition(prior, requested);
                let before = prior.map_or(0, i64::from);
                let after = transition.resulting_vote().map_or(0, i64::from);
                assert_eq!(transition.delta.score, after - before);
                assert_eq!(
                    transition.delta.score,
                    transition.delta.upvotes - transition.delta.downvotes
                );
            }
        }
    }

    #[test]
    fn vote_value_rejects_zero() {
        assert!(VoteValue::try_from(0_i64).is_err());
        assert_eq!(VoteValue::try_from(-1_i64), Ok(VoteValue::Down));
    }
}
