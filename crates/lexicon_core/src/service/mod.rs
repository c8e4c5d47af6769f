//! Vote engine use-case services.
//!
//! # Responsibility
//! - Orchestrate ledger and aggregator calls into cast/read use-cases.
//! - Keep UI layers decoupled from storage details.

pub mod lookup;
pub mod vote_service;
