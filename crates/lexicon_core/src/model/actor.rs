//! Actor identity handed over by the identity provider.
//!
//! # Responsibility
//! - Wrap the provider's stable user identifier in a validated newtype.
//! - Represent "authenticated caller" separately from "anonymous caller".
//!
//! # Invariants
//! - An `ActorId` is non-blank, at most 128 chars, with no whitespace or
//!   control characters.
//! - Credentials are never carried here; only the identifier is inspected.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ACTOR_ID_MAX_CHARS: usize = 128;
const LOG_PREFIX_CHARS: usize = 6;

static ACTOR_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s\p{Cc}]+$").expect("valid actor id regex"));

/// Stable identifier of an authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    /// Parses a provider identifier.
    ///
    /// Leading/trailing whitespace is trimmed before validation.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, ActorIdError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ActorIdError::Blank);
        }
        let len = trimmed.chars().count();
        if len > ACTOR_ID_MAX_CHARS {
            return Err(ActorIdError::TooLong {
                len,
                max: ACTOR_ID_MAX_CHARS,
            });
        }
        if !ACTOR_ID_RE.is_match(trimmed) {
            return Err(ActorIdError::InvalidCharacters(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix safe to put in log lines.
    pub fn log_prefix(&self) -> String {
        let prefix: String = self.0.chars().take(LOG_PREFIX_CHARS).collect();
        if self.0.chars().count() > LOG_PREFIX_CHARS {
            format!("{prefix}..")
        } else {
            prefix
        }
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ActorId {
    type Error = ActorIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ActorId> for String {
    fn from(value: ActorId) -> Self {
        value.0
    }
}

/// Validation errors for actor identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorIdError {
    Blank,
    TooLong { len: usize, max: usize },
    InvalidCharacters(String),
}

impl Display for ActorIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "actor id must not be blank"),
            Self::TooLong { len, max } => {
                write!(f, "actor id has {len} chars, maximum is {max}")
            }
            Self::InvalidCharacters(value) => write!(
                f,
                "actor id `{value}` contains whitespace or control characters"
            ),
        }
    }
}

impl Error for ActorIdError {}

/// Authenticated actor reference supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    /// Display name shown next to authored content; never used for voting.
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            display_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActorId, ActorIdError};

    #[test]
    fn parse_trims_and_accepts_provider_uids() {
        let id = ActorId::parse("  xG7kQ2mN9pR4sT1u ").unwrap();
        assert_eq!(id.as_str(), "xG7kQ2mN9pR4sT1u");
        assert_eq!(id.log_prefix(), "xG7kQ2..");
    }

    #[test]
    fn parse_rejects_blank_and_inner_whitespace() {
        assert_eq!(ActorId::parse("   "), Err(ActorIdError::Blank));
        assert!(matches!(
            ActorId::parse("two words"),
            Err(ActorIdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            ActorId::parse("a".repeat(129)),
            Err(ActorIdError::TooLong { len: 129, .. })
        ));
    }
}
