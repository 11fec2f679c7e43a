use timeweave_types::{
    board::{Color, Piece, PieceKind, Square},
    game::{CastleSide, CastlingRights, GameState, Move, MoveKind},
    Result,
};

use crate::engine_error;

/// Produces the state after `mv`. The input state is never modified.
///
/// The move is trusted to be legal; only consistency between the record and
/// the board is checked (right side to move, piece actually present).
pub fn apply_move(state: &GameState, mv: &Move) -> Result<GameState> {
    let mover = mv.color();
    if mover != state.side_to_move {
        return Err(engine_error(format!(
            "{} is not {mover}'s to play; {} is to move",
            mv.notation, state.side_to_move
        )));
    }

    let mut next = state.clone();
    let resets_clock = match mv.kind {
        MoveKind::Normal | MoveKind::EnPassant | MoveKind::Castle(_) => {
            apply_board_move(&mut next, mv)?
        }
        MoveKind::Departure { .. } => apply_departure(&mut next, mv)?,
        MoveKind::Arrival { .. } => apply_arrival(&mut next, mv)?,
    };

    next.halfmove_clock = if resets_clock {
        0
    } else {
        state.halfmove_clock.saturating_add(1)
    };
    if mover == Color::Black {
        next.fullmove_number = next.fullmove_number.saturating_add(1);
    }
    next.side_to_move = mover.opponent();
    Ok(next)
}

fn expect_piece(state: &GameState, square: Square, piece: Piece) -> Result<()> {
    match state.board.piece_at(square) {
        Some(found) if found == piece => Ok(()),
        Some(found) => Err(engine_error(format!(
            "expected {piece:?} on {square}, found {found:?}"
        ))),
        None => Err(engine_error(format!("expected {piece:?} on {square}, found nothing"))),
    }
}

fn placed_piece(mv: &Move) -> Piece {
    match mv.promotion {
        Some(kind) => Piece::new(mv.piece.color, kind),
        None => mv.piece,
    }
}

/// Returns whether the halfmove clock resets.
fn apply_board_move(next: &mut GameState, mv: &Move) -> Result<bool> {
    expect_piece(next, mv.from, mv.piece)?;
    let board = &mut next.board;
    board.take(mv.from);

    let captured = match mv.kind {
        MoveKind::EnPassant => {
            board.set_piece(mv.to, Some(placed_piece(mv)));
            board.take(Square::new(mv.from.row, mv.to.col))
        }
        _ => board.set_piece(mv.to, Some(placed_piece(mv))),
    };

    if let MoveKind::Castle(side) = mv.kind {
        let row = mv.from.row;
        let rook = board
            .take(Square::new(row, side.rook_col()))
            .ok_or_else(|| engine_error(format!("no rook to castle with for {}", mv.notation)))?;
        board.set_piece(Square::new(row, side.rook_target_col()), Some(rook));
    }

    revoke_for_square(&mut next.castling, mv.from);
    revoke_for_square(&mut next.castling, mv.to);

    next.en_passant = if mv.piece.kind == PieceKind::Pawn && mv.from.row.abs_diff(mv.to.row) == 2 {
        Some(Square::new((mv.from.row + mv.to.row) / 2, mv.from.col))
    } else {
        None
    };

    Ok(mv.piece.kind == PieceKind::Pawn || captured.is_some())
}

fn apply_departure(next: &mut GameState, mv: &Move) -> Result<bool> {
    expect_piece(next, mv.from, mv.piece)?;
    next.board.take(mv.from);
    revoke_for_square(&mut next.castling, mv.from);
    next.en_passant = None;
    Ok(mv.piece.kind == PieceKind::Pawn)
}

fn apply_arrival(next: &mut GameState, mv: &Move) -> Result<bool> {
    let occupant = next.board.piece_at(mv.to);
    if occupant.map_or(false, |p| p.color == mv.piece.color) {
        return Err(engine_error(format!(
            "{} lands on a friendly piece",
            mv.notation
        )));
    }
    if occupant != mv.captured {
        return Err(engine_error(format!(
            "{} expected to capture {:?} but found {occupant:?}",
            mv.notation, mv.captured
        )));
    }
    next.board.set_piece(mv.to, Some(placed_piece(mv)));
    revoke_for_square(&mut next.castling, mv.to);
    next.en_passant = None;
    Ok(mv.piece.kind == PieceKind::Pawn || occupant.is_some())
}

/// Any move touching a king or rook home square revokes the matching rights.
fn revoke_for_square(rights: &mut CastlingRights, square: Square) {
    for color in [Color::White, Color::Black] {
        let row = color.home_row();
        if square.row != row {
            continue;
        }
        match square.col {
            4 => rights.revoke_all(color),
            col if col == CastleSide::KingSide.rook_col() => {
                rights.revoke(color, CastleSide::KingSide)
            }
            col if col == CastleSide::QueenSide.rook_col() => {
                rights.revoke(color, CastleSide::QueenSide)
            }
            _ => {}
        }
    }
}
