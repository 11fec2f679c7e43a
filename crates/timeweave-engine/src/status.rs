use timeweave_types::{
    board::Color,
    game::{GameState, GameStatus},
};

use crate::{attacks::is_square_attacked, movegen::legal_moves};

/// Whether any king of `color` is attacked. A side without a king is never in check.
pub fn is_in_check(state: &GameState, color: Color) -> bool {
    state
        .board
        .kings(color)
        .into_iter()
        .any(|king| is_square_attacked(&state.board, king, color.opponent()))
}

/// True when `color` has exactly one king and it is attacked.
pub fn exposes_king(state: &GameState, color: Color) -> bool {
    let kings = state.board.kings(color);
    kings.len() == 1 && is_square_attacked(&state.board, kings[0], color.opponent())
}

pub fn status(state: &GameState) -> GameStatus {
    let side = state.side_to_move;
    if state.board.kings(side).len() != 1 {
        return GameStatus::Indeterminate;
    }
    if !legal_moves(state).is_empty() {
        return GameStatus::InPlay;
    }
    if is_in_check(state, side) {
        GameStatus::Checkmate
    } else {
        GameStatus::Stalemate
    }
}

pub fn is_checkmate(state: &GameState) -> bool {
    status(state) == GameStatus::Checkmate
}

pub fn is_stalemate(state: &GameState) -> bool {
    status(state) == GameStatus::Stalemate
}
