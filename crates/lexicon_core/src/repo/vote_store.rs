//! Transactional vote store and counter drift sweep over one SQLite connection.
//!
//! # Responsibility
//! - Apply the ledger write and the counter delta of one cast as a single unit.
//! - Recompute counters from live votes and report or repair drift left by
//!   split writes.
//!
//! # Invariants
//! - `cast_vote` either commits both writes or neither.
//! - `repair_drift` overwrites counters only inside an `IMMEDIATE` transaction,
//!   so no additive delta can interleave with the recompute.
//! - Dangling votes (no matching definition) are reported, never deleted.

use crate::model::actor::ActorId;
use crate::model::definition::{DefinitionId, Tally};
use crate::model::vote::{vote_transition, VoteTransition, VoteValue};
use crate::repo::definition_repo::apply_delta_sql;
use crate::repo::vote_repo::{load_vote, write_transition};
use crate::repo::{count_from_db, ensure_tables, parse_uuid, RepoResult};
use log::{info, warn};
use rusqlite::{params, Connection, TransactionBehavior};

const DRIFT_SQL: &str = "SELECT uuid, upvotes, downvotes, score, derived_up, derived_down
FROM (
    SELECT
        d.seq,
        d.uuid,
        d.upvotes,
        d.downvotes,
        d.score,
        (SELECT COUNT(*) FROM votes v WHERE v.definition_uuid = d.uuid AND v.value = 1)
            AS derived_up,
        (SELECT COUNT(*) FROM votes v WHERE v.definition_uuid = d.uuid AND v.value = -1)
            AS derived_down
    FROM definitions d
)
WHERE upvotes != derived_up
   OR downvotes != derived_down
   OR score != derived_up - derived_down
ORDER BY seq ASC;";

const DANGLING_SQL: &str = "SELECT definition_uuid, COUNT(*) AS records
FROM votes
WHERE definition_uuid NOT IN (SELECT uuid FROM definitions)
GROUP BY definition_uuid
ORDER BY definition_uuid ASC;";

/// One definition whose stored counters disagree with its live votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreDrift {
    pub definition_id: DefinitionId,
    pub stored: Tally,
    pub derived: Tally,
}

/// Votes pointing at a definition that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DanglingVotes {
    pub definition_id: DefinitionId,
    pub records: u64,
}

/// Result of one consistency sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub drifted: Vec<ScoreDrift>,
    pub dangling: Vec<DanglingVotes>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty() && self.dangling.is_empty()
    }
}

/// Vote store owning one connection for transactional casts and sweeps.
pub struct SqliteVoteStore<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteVoteStore<'conn> {
    /// Creates the store from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["definitions", "votes"])?;
        Ok(Self { conn })
    }

    /// Casts a vote with the ledger write and counter delta in one transaction.
    ///
    /// A missing definition rolls back the ledger write and returns `NotFound`.
    pub fn cast_vote(
        &mut self,
        actor_id: &ActorId,
        definition_id: DefinitionId,
        requested: VoteValue,
    ) -> RepoResult<VoteTransition> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let prior = load_vote(&tx, actor_id, definition_id)?;
        let transition = vote_transition(prior, requested);
        write_transition(&tx, actor_id, definition_id, &transition)?;
        apply_delta_sql(&tx, definition_id, transition.delta)?;
        tx.commit()?;
        Ok(transition)
    }

    /// Reports counter drift and dangling votes without changing anything.
    pub fn find_drift(&self) -> RepoResult<DriftReport> {
        collect_drift(&*self.conn)
    }

    /// Recomputes drifted counters from live votes and returns what was fixed.
    pub fn repair_drift(&mut self) -> RepoResult<DriftReport> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report = collect_drift(&tx)?;
        for drift in &report.drifted {
            tx.execute(
                "UPDATE definitions
                 SET
                    upvotes = ?2,
                    downvotes = ?3,
                    score = ?4
                 WHERE uuid = ?1;",
                params![
                    drift.definition_id.to_string(),
                    drift.derived.upvotes as i64,
                    drift.derived.downvotes as i64,
                    drift.derived.score,
                ],
            )?;
        }
        tx.commit()?;

        if report.drifted.is_empty() {
            info!("event=drift_repair module=repo status=ok repaired=0");
        } else {
            warn!(
                "event=drift_repair module=repo status=ok repaired={} dangling={}",
                report.drifted.len(),
                report.dangling.len()
            );
        }
        Ok(report)
    }
}

fn collect_drift(conn: &Connection) -> RepoResult<DriftReport> {
    let mut drifted = Vec::new();
    let mut stmt = conn.prepare(DRIFT_SQL)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get("uuid")?;
        let derived_up = count_from_db(row.get("derived_up")?, "votes")?;
        let derived_down = count_from_db(row.get("derived_down")?, "votes")?;
        drifted.push(ScoreDrift {
            definition_id: parse_uuid(&uuid_text, "definitions.uuid")?,
            stored: Tally {
                upvotes: count_from_db(row.get("upvotes")?, "definitions.upvotes")?,
                downvotes: count_from_db(row.get("downvotes")?, "definitions.downvotes")?,
                score: row.get("score")?,
            },
            derived: Tally::from_counts(derived_up, derived_down),
        });
    }

    let mut dangling = Vec::new();
    let mut stmt = conn.prepare(DANGLING_SQL)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get("definition_uuid")?;
        dangling.push(DanglingVotes {
            definition_id: parse_uuid(&uuid_text, "votes.definition_uuid")?,
            records: count_from_db(row.get("records")?, "votes")?,
        });
    }

    if !drifted.is_empty() || !dangling.is_empty() {
        warn!(
            "event=drift_scan module=repo status=drift drifted={} dangling={}",
            drifted.len(),
            dangling.len()
        );
    }
    Ok(DriftReport { drifted, dangling })
}
