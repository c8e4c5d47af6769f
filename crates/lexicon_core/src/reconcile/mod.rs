//! Client-side optimistic vote projection.
//!
//! # Responsibility
//! - Give immediate feedback for a vote before the store confirms it.
//! - Converge on the next authoritative read (server wins, no merge).

pub mod client;
