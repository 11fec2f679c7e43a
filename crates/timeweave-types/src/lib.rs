//! Shared domain types for the timeweave multi-timeline chess engine.

pub mod board;
pub mod config;
pub mod events;
pub mod fen;
pub mod game;
pub mod persist;

mod errors;

pub use errors::{Result, TimeweaveError};

/// Identifier of one timeline. Ids are handed out monotonically and never reused.
pub type TimelineId = u32;
