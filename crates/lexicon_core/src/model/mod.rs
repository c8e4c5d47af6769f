//! Domain model for definitions, actors and votes.
//!
//! # Responsibility
//! - Define canonical data structures used by the ledger and aggregator.
//! - Host the vote transition table shared by server and client paths.
//!
//! # Invariants
//! - Vote values are strictly directional; "no vote" is modeled as absence.
//! - Counters are only ever changed through `TallyDelta` values.

pub mod actor;
pub mod definition;
pub mod vote;
