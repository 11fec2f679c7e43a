//! Move records for pieces crossing between timelines.

use timeweave_types::{
    board::{Piece, PieceKind, Square},
    game::{GameState, Move, MoveKind},
    Result, TimelineId,
};

use crate::{engine_error, notation};

/// Record for `from` leaving `state` towards `destination`.
pub fn departure_record(state: &GameState, from: Square, destination: TimelineId) -> Result<Move> {
    let piece = state
        .board
        .piece_at(from)
        .ok_or_else(|| engine_error(format!("no piece on {from} to depart")))?;
    if piece.color != state.side_to_move {
        return Err(engine_error(format!(
            "{piece:?} on {from} cannot move while {} is to play",
            state.side_to_move
        )));
    }
    Ok(Move {
        from,
        to: from,
        piece,
        captured: None,
        promotion: None,
        is_white: piece.color.is_white(),
        notation: notation::departure(piece, from, destination),
        kind: MoveKind::Departure { destination },
    })
}

/// Record for `piece` arriving on `to` in `state` from `origin`.
///
/// Any opposing occupant is captured. A pawn landing on its promotion row
/// promotes to `promotion`, or `default_promotion` when none was requested.
pub fn arrival_record(
    state: &GameState,
    piece: Piece,
    to: Square,
    origin: TimelineId,
    promotion: Option<PieceKind>,
    default_promotion: PieceKind,
) -> Result<Move> {
    if piece.color != state.side_to_move {
        return Err(engine_error(format!(
            "{} cannot arrive while {} is to play",
            piece.color, state.side_to_move
        )));
    }
    let captured = state.board.piece_at(to);
    if captured.map_or(false, |p| p.color == piece.color) {
        return Err(engine_error(format!("{to} is occupied by a friendly piece")));
    }
    let promotion = (piece.kind == PieceKind::Pawn && to.row == piece.color.promotion_row())
        .then(|| promotion.unwrap_or(default_promotion));
    if let Some(kind) = promotion {
        if !kind.is_promotion_target() {
            return Err(engine_error(format!("cannot promote to {kind:?}")));
        }
    }
    Ok(Move {
        from: to,
        to,
        piece,
        captured,
        promotion,
        is_white: piece.color.is_white(),
        notation: notation::arrival(piece, to, origin, captured, promotion),
        kind: MoveKind::Arrival { origin },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply::apply_move, status::is_in_check};
    use timeweave_types::{board::Color, fen};

    fn sq(name: &str) -> Square {
        Square::parse(name).unwrap()
    }

    #[test]
    fn departure_removes_piece_and_passes_turn() {
        let state = GameState::initial();
        let mv = departure_record(&state, sq("g1"), 1).expect("knight departs");
        assert_eq!(mv.notation, "Ng1>>T1");
        let next = apply_move(&state, &mv).expect("apply departure");
        assert!(next.board.is_empty(sq("g1")));
        assert_eq!(next.side_to_move, Color::Black);
        assert!(next.castling.white_king_side);
    }

    #[test]
    fn departing_rook_revokes_castling() {
        let state = fen::parse("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mv = departure_record(&state, sq("h1"), 3).unwrap();
        let next = apply_move(&state, &mv).unwrap();
        assert!(!next.castling.white_king_side);
        assert!(next.castling.white_queen_side);
    }

    #[test]
    fn arrival_captures_and_can_add_material() {
        let state = fen::parse("4k3/8/8/4p3/8/8/8/Q3K3 w - - 0 1").unwrap();
        let queen = Piece::new(Color::White, PieceKind::Queen);
        let mv = arrival_record(&state, queen, sq("e5"), 0, None, PieceKind::Queen).unwrap();
        assert_eq!(mv.captured, Some(Piece::new(Color::Black, PieceKind::Pawn)));
        let next = apply_move(&state, &mv).unwrap();
        assert_eq!(next.board.count(queen), 2);
        assert!(is_in_check(&next, Color::Black));
    }

    #[test]
    fn arrival_rejects_friendly_square_and_wrong_turn() {
        let state = GameState::initial();
        let knight = Piece::new(Color::White, PieceKind::Knight);
        assert!(arrival_record(&state, knight, sq("e2"), 0, None, PieceKind::Queen).is_err());
        let black = Piece::new(Color::Black, PieceKind::Knight);
        assert!(arrival_record(&state, black, sq("e4"), 0, None, PieceKind::Queen).is_err());
    }

    #[test]
    fn arriving_pawn_promotes() {
        let state = fen::parse("1k6/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let pawn = Piece::new(Color::White, PieceKind::Pawn);
        let mv = arrival_record(&state, pawn, sq("h8"), 2, Some(PieceKind::Rook), PieceKind::Queen)
            .unwrap();
        assert_eq!(mv.promotion, Some(PieceKind::Rook));
        let next = apply_move(&state, &mv).unwrap();
        assert_eq!(next.board.piece_at(sq("h8")), Some(Piece::new(Color::White, PieceKind::Rook)));
    }
}
