//! `lexicon` command-line front end for the vote engine.
//!
//! # Responsibility
//! - Open a migrated database and drive vote engine operations from a shell.
//! - Honor `EngineConfig` for write mode, batching and logging.
//!
//! # Invariants
//! - Casting without `--actor` goes through the engine and fails with the
//!   engine's auth error; the CLI never invents an identity.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lexicon_core::{
    cast_vote_atomic, init_logging_from_config, open_db_with_config, Actor, ActorId,
    DefinitionListQuery, EngineConfig, NewDefinition, ScoreAggregator, SqliteDefinitionRepository,
    SqliteVoteLedger, SqliteVoteStore, VoteService, VoteValue, WriteMode,
};
use log::info;
use uuid::Uuid;

/// lexicon - community definition vote engine
#[derive(Parser, Debug)]
#[command(name = "lexicon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, default_value = "lexicon.db")]
    db: PathBuf,

    /// Path to an engine configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files (overrides config)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Authenticated actor id
    #[arg(long)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print core linkage info
    Ping,

    /// Add a definition for a word
    AddDefinition {
        /// Word the definition belongs to
        #[arg(long)]
        word: Uuid,

        /// Author display name
        #[arg(long)]
        author_name: Option<String>,

        /// Definition text
        text: String,

        /// Usage example
        example: String,
    },

    /// Vote on a definition; repeating the same direction retracts it
    Cast {
        definition: Uuid,

        #[arg(value_enum)]
        direction: Direction,
    },

    /// Show the counters of one definition
    Tally { definition: Uuid },

    /// List definitions by score
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        word: Option<Uuid>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Show the actor's votes on the given definitions
    Lookup {
        #[arg(required = true)]
        definitions: Vec<Uuid>,
    },

    /// Compare counters against live votes
    Sweep {
        /// Overwrite drifted counters with recomputed values
        #[arg(long)]
        repair: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::AddDefinition { .. } => "add_definition",
            Self::Cast { .. } => "cast",
            Self::Tally { .. } => "tally",
            Self::List { .. } => "list",
            Self::Lookup { .. } => "lookup",
            Self::Sweep { .. } => "sweep",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    Up,
    Down,
}

impl From<Direction> for VoteValue {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Up => Self::Up,
            Direction::Down => Self::Down,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match cli.config.as_deref() {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config `{}`", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = cli.log_dir {
        config.logging.dir = Some(dir);
    }
    init_logging_from_config(&config.logging).map_err(anyhow::Error::msg)?;
    info!(
        "event=cli_command module=cli status=start command={} write_mode={:?}",
        cli.command.name(),
        config.write_mode
    );

    if let Commands::Ping = cli.command {
        println!("lexicon_core ping={}", lexicon_core::ping());
        println!("lexicon_core version={}", lexicon_core::core_version());
        return Ok(());
    }

    let actor = cli
        .actor
        .as_deref()
        .map(ActorId::parse)
        .transpose()
        .context("invalid --actor")?
        .map(Actor::new);

    let mut conn = open_db_with_config(&cli.db, &config)
        .with_context(|| format!("opening database `{}`", cli.db.display()))?;

    match cli.command {
        Commands::Ping => {}
        Commands::AddDefinition {
            word,
            author_name,
            text,
            example,
        } => {
            let actor = actor.context("--actor is required to author a definition")?;
            let mut request = NewDefinition::new(word, actor.id.as_str(), text, example);
            if let Some(name) = author_name {
                request = request.with_author_name(name);
            }
            let id = SqliteDefinitionRepository::try_new(&conn)?.create_definition(&request)?;
            println!("{id}");
        }
        Commands::Cast {
            definition,
            direction,
        } => {
            let value = VoteValue::from(direction);
            match config.write_mode {
                WriteMode::Atomic => {
                    let mut store = SqliteVoteStore::try_new(&mut conn)?;
                    cast_vote_atomic(&mut store, actor.as_ref(), definition, value)?;
                }
                WriteMode::Split => {
                    let service = VoteService::with_config(
                        SqliteVoteLedger::try_new(&conn)?,
                        SqliteDefinitionRepository::try_new(&conn)?,
                        &config,
                    );
                    service.cast_vote(actor.as_ref(), definition, value)?;
                }
            }
            let tally = SqliteDefinitionRepository::try_new(&conn)?
                .tally(definition)?
                .context("definition disappeared after cast")?;
            println!(
                "upvotes={} downvotes={} score={}",
                tally.upvotes, tally.downvotes, tally.score
            );
        }
        Commands::Tally { definition } => {
            let service = VoteService::new(
                SqliteVoteLedger::try_new(&conn)?,
                SqliteDefinitionRepository::try_new(&conn)?,
            );
            let tally = service.tally(definition)?;
            println!(
                "upvotes={} downvotes={} score={}",
                tally.upvotes, tally.downvotes, tally.score
            );
        }
        Commands::List {
            word,
            author,
            limit,
            offset,
        } => {
            let query = DefinitionListQuery {
                word_id: word,
                author_id: author,
                limit,
                offset,
            };
            let definitions = SqliteDefinitionRepository::try_new(&conn)?.list_by_score(&query)?;
            for definition in definitions {
                println!(
                    "{}\t{:+}\t{}\t{}",
                    definition.id, definition.tally.score, definition.author_name, definition.text
                );
            }
        }
        Commands::Lookup { definitions } => {
            let actor = actor.context("--actor is required to look up votes")?;
            let service = VoteService::with_config(
                SqliteVoteLedger::try_new(&conn)?,
                SqliteDefinitionRepository::try_new(&conn)?,
                &config,
            );
            let votes = service.lookup_votes(&actor.id, &definitions)?;
            for id in definitions {
                match votes.get(&id) {
                    Some(value) => println!("{id}\t{value}"),
                    None => println!("{id}\tnone"),
                }
            }
        }
        Commands::Sweep { repair } => {
            let mut store = SqliteVoteStore::try_new(&mut conn)?;
            let report = if repair {
                store.repair_drift()?
            } else {
                store.find_drift()?
            };
            for drift in &report.drifted {
                println!(
                    "drift\t{}\tstored={:+}\tderived={:+}",
                    drift.definition_id, drift.stored.score, drift.derived.score
                );
            }
            for dangling in &report.dangling {
                println!(
                    "dangling\t{}\trecords={}",
                    dangling.definition_id, dangling.records
                );
            }
            if report.is_clean() {
                println!("clean");
            }
        }
    }
    Ok(())
}
