//! Score aggregator contract and SQLite definition repository.
//!
//! # Responsibility
//! - Keep the denormalized `(upvotes, downvotes, score)` counters per definition.
//! - Serve score-ordered definition lists for word, author and popular views.
//!
//! # Invariants
//! - Counters change only through additive `UPDATE ... SET x = x + ?` deltas.
//! - Lists are ordered by `score DESC, seq ASC` (insertion order breaks ties).
//! - New definitions start with zeroed counters.

use crate::model::definition::{Definition, DefinitionId, NewDefinition, Tally, WordId};
use crate::model::vote::TallyDelta;
use crate::repo::{count_from_db, ensure_tables, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const DEFINITION_SELECT_SQL: &str = "SELECT
    uuid,
    word_id,
    author_id,
    author_name,
    text,
    example,
    created_at,
    upvotes,
    downvotes,
    score
FROM definitions";

/// Filter and pagination options for score-ordered lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionListQuery {
    /// Restrict to one word (word detail view).
    pub word_id: Option<WordId>,
    /// Restrict to one author (profile view).
    pub author_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl DefinitionListQuery {
    pub fn for_word(word_id: WordId) -> Self {
        Self {
            word_id: Some(word_id),
            ..Self::default()
        }
    }

    pub fn for_author(author_id: impl Into<String>) -> Self {
        Self {
            author_id: Some(author_id.into()),
            ..Self::default()
        }
    }

    fn matches(&self, definition: &Definition) -> bool {
        self.word_id.map_or(true, |word_id| definition.word_id == word_id)
            && self
                .author_id
                .as_deref()
                .map_or(true, |author_id| definition.author_id == author_id)
    }

    /// Applies the query to definitions already in list order.
    pub(crate) fn select<'a>(
        &self,
        ordered: impl Iterator<Item = &'a Definition>,
    ) -> Vec<Definition> {
        let limit = self.limit.map_or(usize::MAX, |limit| limit as usize);
        ordered
            .filter(|definition| self.matches(definition))
            .skip(self.offset as usize)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Denormalized counter store for definitions.
pub trait ScoreAggregator {
    /// Adds `delta` to the definition's counters.
    ///
    /// Fails with `NotFound` when the definition does not exist.
    fn apply_delta(&self, definition_id: DefinitionId, delta: TallyDelta) -> RepoResult<()>;

    /// Reads the current counters of one definition.
    fn tally(&self, definition_id: DefinitionId) -> RepoResult<Option<Tally>>;

    /// Reads one definition with its counters.
    fn get_definition(&self, definition_id: DefinitionId) -> RepoResult<Option<Definition>>;

    /// Lists definitions ordered by score descending.
    fn list_by_score(&self, query: &DefinitionListQuery) -> RepoResult<Vec<Definition>>;
}

impl<T: ScoreAggregator + ?Sized> ScoreAggregator for &T {
    fn apply_delta(&self, definition_id: DefinitionId, delta: TallyDelta) -> RepoResult<()> {
        (**self).apply_delta(definition_id, delta)
    }

    fn tally(&self, definition_id: DefinitionId) -> RepoResult<Option<Tally>> {
        (**self).tally(definition_id)
    }

    fn get_definition(&self, definition_id: DefinitionId) -> RepoResult<Option<Definition>> {
        (**self).get_definition(definition_id)
    }

    fn list_by_score(&self, query: &DefinitionListQuery) -> RepoResult<Vec<Definition>> {
        (**self).list_by_score(query)
    }
}

/// SQLite-backed definition repository and score aggregator.
pub struct SqliteDefinitionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDefinitionRepository<'conn> {
    /// Creates the repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["definitions"])?;
        Ok(Self { conn })
    }

    /// Inserts a definition with zeroed counters.
    pub fn create_definition(&self, request: &NewDefinition) -> RepoResult<DefinitionId> {
        let definition = request.normalized()?;
        self.conn.execute(
            "INSERT INTO definitions (
                uuid,
                word_id,
                author_id,
                author_name,
                text,
                example
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                definition.id.to_string(),
                definition.word_id.to_string(),
                definition.author_id,
                definition.author_name,
                definition.text,
                definition.example,
            ],
        )?;
        Ok(definition.id)
    }
}

impl ScoreAggregator for SqliteDefinitionRepository<'_> {
    fn apply_delta(&self, definition_id: DefinitionId, delta: TallyDelta) -> RepoResult<()> {
        apply_delta_sql(self.conn, definition_id, delta)
    }

    fn tally(&self, definition_id: DefinitionId) -> RepoResult<Option<Tally>> {
        let row: Option<(i64, i64, i64)> = self
            .conn
            .query_row(
                "SELECT upvotes, downvotes, score FROM definitions WHERE uuid = ?1;",
                [definition_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(upvotes, downvotes, score)| {
            Ok(Tally {
                upvotes: count_from_db(upvotes, "definitions.upvotes")?,
                downvotes: count_from_db(downvotes, "definitions.downvotes")?,
                score,
            })
        })
        .transpose()
    }

    fn get_definition(&self, definition_id: DefinitionId) -> RepoResult<Option<Definition>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DEFINITION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([definition_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_definition_row(row)?));
        }
        Ok(None)
    }

    fn list_by_score(&self, query: &DefinitionListQuery) -> RepoResult<Vec<Definition>> {
        let mut sql = format!("{DEFINITION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(word_id) = query.word_id {
            sql.push_str(" AND word_id = ?");
            bind_values.push(Value::Text(word_id.to_string()));
        }
        if let Some(author_id) = query.author_id.as_ref() {
            sql.push_str(" AND author_id = ?");
            bind_values.push(Value::Text(author_id.clone()));
        }

        sql.push_str(" ORDER BY score DESC, seq ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut definitions = Vec::new();
        while let Some(row) = rows.next()? {
            definitions.push(parse_definition_row(row)?);
        }
        Ok(definitions)
    }
}

pub(crate) fn apply_delta_sql(
    conn: &Connection,
    definition_id: DefinitionId,
    delta: TallyDelta,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE definitions
         SET
            upvotes = upvotes + ?2,
            downvotes = downvotes + ?3,
            score = score + ?4
         WHERE uuid = ?1;",
        params![
            definition_id.to_string(),
            delta.upvotes,
            delta.downvotes,
            delta.score
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::NotFound(definition_id));
    }
    Ok(())
}

pub(crate) fn parse_definition_row(row: &Row<'_>) -> RepoResult<Definition> {
    let uuid_text: String = row.get("uuid")?;
    let word_text: String = row.get("word_id")?;

    Ok(Definition {
        id: parse_uuid(&uuid_text, "definitions.uuid")?,
        word_id: parse_uuid(&word_text, "definitions.word_id")?,
        author_id: row.get("author_id")?,
        author_name: row.get("author_name")?,
        text: row.get("text")?,
        example: row.get("example")?,
        created_at: row.get("created_at")?,
        tally: Tally {
            upvotes: count_from_db(row.get("upvotes")?, "definitions.upvotes")?,
            downvotes: count_from_db(row.get("downvotes")?, "definitions.downvotes")?,
            score: row.get("score")?,
        },
    })
}
