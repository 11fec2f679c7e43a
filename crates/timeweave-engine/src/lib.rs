//! Chess rule engine tolerant of non-standard material.
//!
//! Everything here is a pure function of a [`GameState`]. Malformed input
//! degrades to an empty move list instead of an error.
//!
//! [`GameState`]: timeweave_types::game::GameState

pub mod apply;
pub mod attacks;
pub mod movegen;
pub mod notation;
pub mod selector;
pub mod status;
pub mod transfer;

pub use apply::apply_move;
pub use movegen::{find_legal_move, legal_moves, legal_moves_from, pseudo_legal_moves};
pub use selector::{FirstLegalSelector, MoveSelector, SelectionContext};
pub use status::{exposes_king, is_checkmate, is_in_check, is_stalemate, status};

use timeweave_types::TimeweaveError;

pub fn engine_error(message: impl Into<String>) -> TimeweaveError {
    TimeweaveError::Validation(message.into())
}
