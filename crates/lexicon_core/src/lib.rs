//! Core vote engine for community-authored definitions.
//! This crate is the single source of truth for voting invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig, LoggingConfig, WriteMode};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::actor::{Actor, ActorId, ActorIdError};
pub use model::definition::{
    Definition, DefinitionId, DefinitionValidationError, NewDefinition, Tally, WordId,
};
pub use model::vote::{
    vote_transition, LedgerEffect, TallyDelta, VoteRecord, VoteTransition, VoteValue,
};
pub use reconcile::client::{ClientReconciler, OptimisticUpdate, UserVote, VoteControls};
pub use repo::definition_repo::{DefinitionListQuery, ScoreAggregator, SqliteDefinitionRepository};
pub use repo::memory::{InMemoryScoreAggregator, InMemoryVoteLedger};
pub use repo::vote_repo::{SqliteVoteLedger, VoteLedger, MAX_LOOKUP_BATCH};
pub use repo::vote_store::{DriftReport, SqliteVoteStore};
pub use repo::{RepoError, RepoResult};
pub use service::lookup::{BatchVoteLookup, VoteMap};
pub use service::vote_service::{cast_vote_atomic, VoteError, VoteResult, VoteService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
