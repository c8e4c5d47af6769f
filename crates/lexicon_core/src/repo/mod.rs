//! Repository layer: vote ledger and score aggregator stores.
//!
//! # Responsibility
//! - Define the ledger and aggregator contracts the vote service depends on.
//! - Provide SQLite and in-memory implementations of both.
//! - Keep SQL details out of service orchestration.
//!
//! # Invariants
//! - Counter writes are additive deltas, never whole-tuple overwrites.
//! - Ledger writes are conditional on the prior vote they were computed from.
//! - Repository APIs return semantic errors (`NotFound`, `StaleVote`) in
//!   addition to DB transport errors.

use crate::db::DbError;
use crate::model::definition::{DefinitionId, DefinitionValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod definition_repo;
pub mod memory;
pub mod vote_repo;
pub mod vote_store;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error type shared by ledger and aggregator stores.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Target definition does not exist.
    NotFound(DefinitionId),
    /// Ledger record no longer matches the prior vote the write was based on.
    StaleVote(DefinitionId),
    /// Membership lookup received more identifiers than the store accepts.
    BatchTooLarge { len: usize, max: usize },
    Validation(DefinitionValidationError),
    /// Required table is missing; the connection was not migrated.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "definition not found: {id}"),
            Self::StaleVote(id) => {
                write!(f, "vote on definition {id} changed since it was read")
            }
            Self::BatchTooLarge { len, max } => {
                write!(f, "vote lookup batch has {len} ids, store accepts at most {max}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::NotFound(_)
            | Self::StaleVote(_)
            | Self::BatchTooLarge { .. }
            | Self::MissingRequiredTable(_)
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<DefinitionValidationError> for RepoError {
    fn from(value: DefinitionValidationError) -> Self {
        Self::Validation(value)
    }
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn count_from_db(value: i64, column: &str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative count `{value}` in {column}")))
}

fn ensure_tables(conn: &rusqlite::Connection, tables: &[&'static str]) -> RepoResult<()> {
    match crate::db::first_missing_table(conn, tables)? {
        Some(table) => Err(RepoError::MissingRequiredTable(table)),
        None => Ok(()),
    }
}
