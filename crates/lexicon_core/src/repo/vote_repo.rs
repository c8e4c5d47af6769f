//! Vote ledger contract and SQLite implementation.
//!
//! # Responsibility
//! - Record which actor holds which vote on which definition.
//! - Serve bounded membership lookups for one actor.
//!
//! # Invariants
//! - At most one record exists per `(actor_id, definition_uuid)`.
//! - A record's value is `1` or `-1`; retraction deletes the row.
//! - Definition existence is not checked here.

use crate::model::actor::ActorId;
use crate::model::definition::DefinitionId;
use crate::model::vote::{LedgerEffect, VoteRecord, VoteTransition, VoteValue};
use crate::repo::{ensure_tables, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};

/// Most identifiers one membership lookup may carry.
pub const MAX_LOOKUP_BATCH: usize = 10;

/// Authoritative store of live votes.
pub trait VoteLedger {
    /// Loads the actor's current vote on one definition.
    fn current_vote(
        &self,
        actor_id: &ActorId,
        definition_id: DefinitionId,
    ) -> RepoResult<Option<VoteValue>>;

    /// Applies the ledger side of a transition.
    ///
    /// Fails with `StaleVote` when the stored record no longer equals
    /// `transition.prior`.
    fn apply_transition(
        &self,
        actor_id: &ActorId,
        definition_id: DefinitionId,
        transition: &VoteTransition,
    ) -> RepoResult<()>;

    /// Loads the actor's votes for at most `MAX_LOOKUP_BATCH` definitions.
    ///
    /// Definitions without a vote are omitted from the result.
    fn votes_in_batch(
        &self,
        actor_id: &ActorId,
        definition_ids: &[DefinitionId],
    ) -> RepoResult<Vec<(DefinitionId, VoteValue)>>;

    /// Lists all live records on one definition.
    fn votes_for_definition(&self, definition_id: DefinitionId) -> RepoResult<Vec<VoteRecord>>;
}

impl<T: VoteLedger + ?Sized> VoteLedger for &T {
    fn current_vote(
        &self,
        actor_id: &ActorId,
        definition_id: DefinitionId,
    ) -> RepoResult<Option<VoteValue>> {
        (**self).current_vote(actor_id, definition_id)
    }

    fn apply_transition(
        &self,
        actor_id: &ActorId,
        definition_id: DefinitionId,
        transition: &VoteTransition,
    ) -> RepoResult<()> {
        (**self).apply_transition(actor_id, definition_id, transition)
    }

    fn votes_in_batch(
        &self,
        actor_id: &ActorId,
        definition_ids: &[DefinitionId],
    ) -> RepoResult<Vec<(DefinitionId, VoteValue)>> {
        (**self).votes_in_batch(actor_id, definition_ids)
    }

    fn votes_for_definition(&self, definition_id: DefinitionId) -> RepoResult<Vec<VoteRecord>> {
        (**self).votes_for_definition(definition_id)
    }
}

/// Rejects lookups over the store's membership limit.
pub fn check_batch_len(len: usize) -> RepoResult<()> {
    if len > MAX_LOOKUP_BATCH {
        return Err(RepoError::BatchTooLarge {
            len,
            max: MAX_LOOKUP_BATCH,
        });
    }
    Ok(())
}

/// SQLite-backed vote ledger.
pub struct SqliteVoteLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVoteLedger<'conn> {
    /// Creates the ledger from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["votes"])?;
        Ok(Self { conn })
    }
}

impl VoteLedger for SqliteVoteLedger<'_> {
    fn current_vote(
        &self,
        actor_id: &ActorId,
        definition_id: DefinitionId,
    ) -> RepoResult<Option<VoteValue>> {
        load_vote(self.conn, actor_id, definition_id)
    }

    fn apply_transition(
        &self,
        actor_id: &ActorId,
        definition_id: DefinitionId,
        transition: &VoteTransition,
    ) -> RepoResult<()> {
        write_transition(self.conn, actor_id, definition_id, transition)
    }

    fn votes_in_batch(
        &self,
        actor_id: &ActorId,
        definition_ids: &[DefinitionId],
    ) -> RepoResult<Vec<(DefinitionId, VoteValue)>> {
        check_batch_len(definition_ids.len())?;
        if definition_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; definition_ids.len()].join(", ");
        let sql = format!(
            "SELECT definition_uuid, value
             FROM votes
             WHERE actor_id = ?
               AND definition_uuid IN ({placeholders});"
        );
        let mut bind_values = Vec::with_capacity(definition_ids.len() + 1);
        bind_values.push(Value::Text(actor_id.as_str().to_string()));
        bind_values.extend(
            definition_ids
                .iter()
                .map(|id| Value::Text(id.to_string())),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut votes = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get("definition_uuid")?;
            let definition_id = parse_uuid(&uuid_text, "votes.definition_uuid")?;
            votes.push((definition_id, parse_vote_value(row)?));
        }
        Ok(votes)
    }

    fn votes_for_definition(&self, definition_id: DefinitionId) -> RepoResult<Vec<VoteRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT actor_id, definition_uuid, value, created_at, updated_at
             FROM votes
             WHERE definition_uuid = ?1
             ORDER BY created_at ASC, actor_id ASC;",
        )?;
        let mut rows = stmt.query([definition_id.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_vote_row(row)?);
        }
        Ok(records)
    }
}

pub(crate) fn load_vote(
    conn: &Connection,
    actor_id: &ActorId,
    definition_id: DefinitionId,
) -> RepoResult<Option<VoteValue>> {
    let value: Option<i64> = conn
        .query_row(
            "SELECT value FROM votes WHERE actor_id = ?1 AND definition_uuid = ?2;",
            params![actor_id.as_str(), definition_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    value.map(vote_value_from_db).transpose()
}

pub(crate) fn write_transition(
    conn: &Connection,
    actor_id: &ActorId,
    definition_id: DefinitionId,
    transition: &VoteTransition,
) -> RepoResult<()> {
    let definition_text = definition_id.to_string();
    let changed = match (transition.effect, transition.prior) {
        (LedgerEffect::Insert(value), _) => {
            let inserted = conn.execute(
                "INSERT INTO votes (actor_id, definition_uuid, value) VALUES (?1, ?2, ?3);",
                params![actor_id.as_str(), definition_text, i64::from(value)],
            );
            match inserted {
                Ok(changed) => changed,
                Err(rusqlite::Error::SqliteFailure(failure, _))
                    if failure.code == ErrorCode::ConstraintViolation =>
                {
                    0
                }
                Err(err) => return Err(err.into()),
            }
        }
        (LedgerEffect::Update(value), Some(prior)) => conn.execute(
            "UPDATE votes
             SET
                value = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE actor_id = ?1
               AND definition_uuid = ?2
               AND value = ?4;",
            params![
                actor_id.as_str(),
                definition_text,
                i64::from(value),
                i64::from(prior)
            ],
        )?,
        (LedgerEffect::Delete, Some(prior)) => conn.execute(
            "DELETE FROM votes
             WHERE actor_id = ?1
               AND definition_uuid = ?2
               AND value = ?3;",
            params![actor_id.as_str(), definition_text, i64::from(prior)],
        )?,
        (LedgerEffect::Update(_) | LedgerEffect::Delete, None) => {
            return Err(RepoError::InvalidData(
                "update/delete transition without a prior vote".to_string(),
            ));
        }
    };

    if changed == 0 {
        return Err(RepoError::StaleVote(definition_id));
    }
    Ok(())
}

fn parse_vote_value(row: &Row<'_>) -> RepoResult<VoteValue> {
    vote_value_from_db(row.get("value")?)
}

fn vote_value_from_db(raw: i64) -> RepoResult<VoteValue> {
    VoteValue::try_from(raw)
        .map_err(|err| RepoError::InvalidData(format!("{err} in votes.value")))
}

fn parse_vote_row(row: &Row<'_>) -> RepoResult<VoteRecord> {
    let actor_text: String = row.get("actor_id")?;
    let actor_id = ActorId::parse(&actor_text)
        .map_err(|err| RepoError::InvalidData(format!("{err} in votes.actor_id")))?;
    let uuid_text: String = row.get("definition_uuid")?;

    Ok(VoteRecord {
        actor_id,
        definition_id: parse_uuid(&uuid_text, "votes.definition_uuid")?,
        value: parse_vote_value(row)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{SqliteVoteLedger, VoteLedger};
    use crate::db::open_db_in_memory;
    use crate::model::actor::ActorId;
    use crate::repo::RepoError;
    use rusqlite::params;
    use uuid::Uuid;

    #[test]
    fn corrupt_stored_value_is_invalid_data_on_every_read_path() {
        let conn = open_db_in_memory().unwrap();
        let definition_id = Uuid::new_v4();
        conn.execute_batch("PRAGMA ignore_check_constraints = ON;")
            .unwrap();
        conn.execute(
            "INSERT INTO votes (actor_id, definition_uuid, value) VALUES ('u1', ?1, 2);",
            params![definition_id.to_string()],
        )
        .unwrap();

        let ledger = SqliteVoteLedger::try_new(&conn).unwrap();
        let actor = ActorId::parse("u1").unwrap();
        let errors = [
            ledger.current_vote(&actor, definition_id).unwrap_err(),
            ledger.votes_for_definition(definition_id).unwrap_err(),
            ledger
                .votes_in_batch(&actor, &[definition_id])
                .unwrap_err(),
        ];
        for err in errors {
            assert!(
                matches!(&err, RepoError::InvalidData(message) if message.contains("votes.value")),
                "unexpected error: {err}"
            );
        }
    }
}
