//! Votable definition items and their denormalized counters.
//!
//! # Responsibility
//! - Define the item read model returned by the aggregator.
//! - Provide counter arithmetic shared by the store and the client projection.
//!
//! # Invariants
//! - `upvotes` and `downvotes` are never negative.
//! - `score == upvotes - downvotes` for every tally read through the aggregator.

use crate::model::vote::TallyDelta;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a votable definition.
pub type DefinitionId = Uuid;

/// Identifier of the word a definition belongs to.
pub type WordId = Uuid;

const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// Popularity counters of one definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tally {
    pub upvotes: u64,
    pub downvotes: u64,
    pub score: i64,
}

impl Tally {
    pub const ZERO: Self = Self {
        upvotes: 0,
        downvotes: 0,
        score: 0,
    };

    /// Builds a tally from raw counts, deriving `score`.
    pub fn from_counts(upvotes: u64, downvotes: u64) -> Self {
        Self {
            upvotes,
            downvotes,
            score: upvotes as i64 - downvotes as i64,
        }
    }

    /// Applies a delta, returning `None` when a count would go negative.
    pub fn checked_apply(&self, delta: TallyDelta) -> Option<Self> {
        Some(Self {
            upvotes: self.upvotes.checked_add_signed(delta.upvotes)?,
            downvotes: self.downvotes.checked_add_signed(delta.downvotes)?,
            score: self.score.checked_add(delta.score)?,
        })
    }

    /// Applies a delta, clamping counts at zero.
    ///
    /// Used by the client projection, where a stale base can otherwise
    /// underflow; the next authoritative read replaces the result anyway.
    pub fn saturating_apply(&self, delta: TallyDelta) -> Self {
        Self {
            upvotes: self.upvotes.saturating_add_signed(delta.upvotes),
            downvotes: self.downvotes.saturating_add_signed(delta.downvotes),
            score: self.score.saturating_add(delta.score),
        }
    }

    /// Whether `score == upvotes - downvotes`.
    pub fn is_consistent(&self) -> bool {
        self.upvotes as i64 - self.downvotes as i64 == self.score
    }
}

/// Definition item as read from the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub id: DefinitionId,
    pub word_id: WordId,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub example: String,
    /// Epoch ms.
    pub created_at: i64,
    #[serde(flatten)]
    pub tally: Tally,
}

/// Insert request used by the authoring flow; counters always start at zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDefinition {
    pub id: DefinitionId,
    pub word_id: WordId,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub example: String,
}

impl NewDefinition {
    /// Creates a request with a generated id.
    pub fn new(
        word_id: WordId,
        author_id: impl Into<String>,
        text: impl Into<String>,
        example: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            word_id,
            author_id: author_id.into(),
            author_name: String::new(),
            text: text.into(),
            example: example.into(),
        }
    }

    pub fn with_author_name(mut self, name: impl Into<String>) -> Self {
        self.author_name = name.into();
        self
    }

    /// Validates required fields and fills the anonymous author fallback.
    pub fn normalized(&self) -> Result<Self, DefinitionValidationError> {
        if self.author_id.trim().is_empty() {
            return Err(DefinitionValidationError::BlankAuthor);
        }
        if self.text.trim().is_empty() {
            return Err(DefinitionValidationError::BlankText);
        }
        if self.example.trim().is_empty() {
            return Err(DefinitionValidationError::BlankExample);
        }

        let author_name = match self.author_name.trim() {
            "" => ANONYMOUS_AUTHOR.to_string(),
            name => name.to_string(),
        };

        Ok(Self {
            id: self.id,
            word_id: self.word_id,
            author_id: self.author_id.trim().to_string(),
            author_name,
            text: self.text.trim().to_string(),
            example: self.example.trim().to_string(),
        })
    }
}

/// Validation errors for new definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionValidationError {
    BlankAuthor,
    BlankText,
    BlankExample,
}

impl Display for DefinitionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankAuthor => write!(f, "definition author id must not be blank"),
            Self::BlankText => write!(f, "definition text must not be blank"),
            Self::BlankExample => write!(f, "definition example must not be blank"),
        }
    }
}

impl Error for DefinitionValidationError {}

#[cfg(test)]
mod tests {
    use super::{DefinitionValidationError, NewDefinition, Tally};
    use crate::model::vote::TallyDelta;
    use uuid::Uuid;

    #[test]
    fn checked_apply_rejects_negative_counts() {
        let tally = Tally::from_counts(0, 1);
        assert_eq!(tally.checked_apply(TallyDelta::new(-1, 0)), None);
        assert_eq!(
            tally.checked_apply(TallyDelta::new(0, -1)),
            Some(Tally::ZERO)
        );
    }

    #[test]
    fn saturating_apply_clamps_and_tracks_score() {
        let tally = Tally::ZERO.saturating_apply(TallyDelta::new(-1, 0));
        assert_eq!(tally.upvotes, 0);
        assert_eq!(tally.score, -1);
        assert!(!tally.is_consistent());
    }

    #[test]
    fn normalized_fills_anonymous_author_and_rejects_blank_text() {
        let request = NewDefinition::new(Uuid::new_v4(), "u1", " rizz ", " he has rizz ");
        let normalized = request.normalized().unwrap();
        assert_eq!(normalized.author_name, "Anonymous");
        assert_eq!(normalized.text, "rizz");

        let blank = NewDefinition::new(Uuid::new_v4(), "u1", "  ", "example");
        assert_eq!(
            blank.normalized(),
            Err(DefinitionValidationError::BlankText)
        );
    }
}
