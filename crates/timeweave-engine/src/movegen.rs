use timeweave_types::{
    board::{Piece, PieceKind, Square},
    game::{CastleSide, GameState, Move, MoveKind},
};

use crate::{
    apply::apply_move,
    attacks::{is_square_attacked, BISHOP_DIRECTIONS, KING_OFFSETS, KNIGHT_OFFSETS, ROOK_DIRECTIONS},
    notation,
    status::exposes_king,
};

const KING_HOME_COL: u8 = 4;

fn record(
    state: &GameState,
    piece: Piece,
    from: Square,
    to: Square,
    captured: Option<Piece>,
    promotion: Option<PieceKind>,
    kind: MoveKind,
) -> Move {
    debug_assert_eq!(piece.color, state.side_to_move);
    Move {
        from,
        to,
        piece,
        captured,
        promotion,
        is_white: piece.color.is_white(),
        notation: notation::describe(kind, piece, from, to, captured, promotion),
        kind,
    }
}

/// Every move obeying piece movement rules for the side to move, ignoring
/// whether it leaves the mover's own king attacked.
pub fn pseudo_legal_moves(state: &GameState) -> Vec<Move> {
    let side = state.side_to_move;
    let mut moves = Vec::new();
    for (from, piece) in state.board.pieces().filter(|(_, p)| p.color == side) {
        match piece.kind {
            PieceKind::Pawn => pawn_moves(state, from, piece, &mut moves),
            PieceKind::Knight => step_moves(state, from, piece, &KNIGHT_OFFSETS, &mut moves),
            PieceKind::Bishop => slide_moves(state, from, piece, &BISHOP_DIRECTIONS, &mut moves),
            PieceKind::Rook => slide_moves(state, from, piece, &ROOK_DIRECTIONS, &mut moves),
            PieceKind::Queen => {
                slide_moves(state, from, piece, &ROOK_DIRECTIONS, &mut moves);
                slide_moves(state, from, piece, &BISHOP_DIRECTIONS, &mut moves);
            }
            PieceKind::King => {
                step_moves(state, from, piece, &KING_OFFSETS, &mut moves);
                castling_moves(state, from, piece, &mut moves);
            }
        }
    }
    moves
}

/// Legal moves for the side to move.
///
/// Moves that leave the mover's king attacked are removed only when the side to
/// move has exactly one king. With no king, or several, there is no single king
/// to protect and every pseudo-legal move is returned.
pub fn legal_moves(state: &GameState) -> Vec<Move> {
    let side = state.side_to_move;
    let pseudo = pseudo_legal_moves(state);
    if state.board.kings(side).len() != 1 {
        return pseudo;
    }
    pseudo
        .into_iter()
        .filter(|mv| match apply_move(state, mv) {
            Ok(next) => !exposes_king(&next, side),
            Err(_) => false,
        })
        .collect()
}

pub fn legal_moves_from(state: &GameState, from: Square) -> Vec<Move> {
    legal_moves(state)
        .into_iter()
        .filter(|mv| mv.from == from)
        .collect()
}

/// Looks up the legal move `from -> to`. A pawn reaching the last rank uses
/// `promotion`, or `default_promotion` when the caller did not pick one.
pub fn find_legal_move(
    state: &GameState,
    from: Square,
    to: Square,
    promotion: Option<PieceKind>,
    default_promotion: PieceKind,
) -> Option<Move> {
    let wanted = promotion.unwrap_or(default_promotion);
    legal_moves_from(state, from)
        .into_iter()
        .filter(|mv| mv.to == to)
        .find(|mv| mv.promotion.map_or(true, |kind| kind == wanted))
}

fn push_pawn_move(
    state: &GameState,
    from: Square,
    to: Square,
    piece: Piece,
    captured: Option<Piece>,
    moves: &mut Vec<Move>,
) {
    if to.row == piece.color.promotion_row() {
        for kind in PieceKind::PROMOTIONS {
            moves.push(record(state, piece, from, to, captured, Some(kind), MoveKind::Normal));
        }
    } else {
        moves.push(record(state, piece, from, to, captured, None, MoveKind::Normal));
    }
}

fn pawn_moves(state: &GameState, from: Square, piece: Piece, moves: &mut Vec<Move>) {
    let board = &state.board;
    let forward = piece.color.forward();

    if let Some(one) = from.offset(forward, 0).filter(|sq| board.is_empty(*sq)) {
        push_pawn_move(state, from, one, piece, None, moves);
        if from.row == piece.color.pawn_row() {
            if let Some(two) = from.offset(2 * forward, 0).filter(|sq| board.is_empty(*sq)) {
                moves.push(record(state, piece, from, two, None, None, MoveKind::Normal));
            }
        }
    }

    for dc in [-1, 1] {
        let Some(target) = from.offset(forward, dc) else {
            continue;
        };
        match board.piece_at(target) {
            Some(victim) if victim.color != piece.color => {
                push_pawn_move(state, from, target, piece, Some(victim), moves);
            }
            Some(_) => {}
            None if state.en_passant == Some(target) => {
                // The captured pawn sits beside the mover, not on the target square.
                let behind = Square::new(from.row, target.col);
                let victim = Piece::new(piece.color.opponent(), PieceKind::Pawn);
                if board.piece_at(behind) == Some(victim) {
                    moves.push(record(
                        state,
                        piece,
                        from,
                        target,
                        Some(victim),
                        None,
                        MoveKind::EnPassant,
                    ));
                }
            }
            None => {}
        }
    }
}

fn step_moves(
    state: &GameState,
    from: Square,
    piece: Piece,
    offsets: &[(i8, i8)],
    moves: &mut Vec<Move>,
) {
    for &(dr, dc) in offsets {
        let Some(to) = from.offset(dr, dc) else {
            continue;
        };
        match state.board.piece_at(to) {
            Some(occupant) if occupant.color == piece.color => {}
            captured => moves.push(record(state, piece, from, to, captured, None, MoveKind::Normal)),
        }
    }
}

fn slide_moves(
    state: &GameState,
    from: Square,
    piece: Piece,
    directions: &[(i8, i8)],
    moves: &mut Vec<Move>,
) {
    for &(dr, dc) in directions {
        let mut cur = from;
        while let Some(to) = cur.offset(dr, dc) {
            cur = to;
            match state.board.piece_at(to) {
                None => moves.push(record(state, piece, from, to, None, None, MoveKind::Normal)),
                Some(occupant) => {
                    if occupant.color != piece.color {
                        moves.push(record(state, piece, from, to, Some(occupant), None, MoveKind::Normal));
                    }
                    break;
                }
            }
        }
    }
}

fn castling_moves(state: &GameState, from: Square, king: Piece, moves: &mut Vec<Move>) {
    let color = king.color;
    let row = color.home_row();
    if from != Square::new(row, KING_HOME_COL) {
        return;
    }
    let enemy = color.opponent();
    let board = &state.board;

    for side in [CastleSide::KingSide, CastleSide::QueenSide] {
        if !state.castling.get(color, side) {
            continue;
        }
        let rook_sq = Square::new(row, side.rook_col());
        if board.piece_at(rook_sq) != Some(Piece::new(color, PieceKind::Rook)) {
            continue;
        }

        let (lo, hi) = if side.rook_col() < KING_HOME_COL {
            (side.rook_col() + 1, KING_HOME_COL)
        } else {
            (KING_HOME_COL + 1, side.rook_col())
        };
        if (lo..hi).any(|col| !board.is_empty(Square::new(row, col))) {
            continue;
        }

        let target_col = side.king_target_col();
        let (pass_lo, pass_hi) = if target_col < KING_HOME_COL {
            (target_col, KING_HOME_COL)
        } else {
            (KING_HOME_COL, target_col)
        };
        if (pass_lo..=pass_hi).any(|col| is_square_attacked(board, Square::new(row, col), enemy)) {
            continue;
        }

        moves.push(record(
            state,
            king,
            from,
            Square::new(row, target_col),
            None,
            None,
            MoveKind::Castle(side),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeweave_types::{board::Color, fen};

    fn sq(name: &str) -> Square {
        Square::parse(name).unwrap()
    }

    fn perft(state: &GameState, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        legal_moves(state)
            .iter()
            .map(|mv| perft(&apply_move(state, mv).expect("legal move applies"), depth - 1))
            .sum()
    }

    #[test]
    fn initial_position_counts() {
        let state = GameState::initial();
        assert_eq!(legal_moves(&state).len(), 20);
        assert_eq!(perft(&state, 2), 400);
        assert_eq!(perft(&state, 3), 8_902);
    }

    #[test]
    fn castling_en_passant_and_promotion_counts() {
        let kiwipete = fen::parse(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        assert_eq!(legal_moves(&kiwipete).len(), 48);
        assert_eq!(perft(&kiwipete, 2), 2_039);

        let endgame = fen::parse("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        assert_eq!(perft(&endgame, 3), 2_812);
    }

    #[test]
    fn friendly_squares_are_never_targets() {
        let state = GameState::initial();
        assert!(legal_moves(&state)
            .iter()
            .all(|mv| state.board.piece_at(mv.to).map_or(true, |p| p.color != mv.piece.color)));
    }

    #[test]
    fn single_king_filters_self_check() {
        let state = fen::parse("1r5k/8/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let moves = legal_moves_from(&state, sq("a1"));
        assert!(moves.iter().all(|mv| mv.to.col != 1));
        assert!(moves.iter().any(|mv| mv.to == sq("a2")));
    }

    #[test]
    fn multiple_kings_skip_check_filtering() {
        let state = fen::parse("1r5k/8/8/8/8/8/8/K3K3 w - - 0 1").unwrap();
        let moves = legal_moves_from(&state, sq("a1"));
        assert!(moves.iter().any(|mv| mv.to == sq("b1")));
        assert_eq!(legal_moves(&state), pseudo_legal_moves(&state));
    }

    #[test]
    fn kingless_side_gets_pseudo_legal_moves() {
        let state = fen::parse("4k3/8/8/8/8/8/8/Q7 w - - 0 1").unwrap();
        assert_eq!(legal_moves(&state).len(), 21);
    }

    #[test]
    fn promotion_defaults_to_queen_and_honours_request() {
        let state = fen::parse("7k/P7/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let queen = find_legal_move(&state, sq("a7"), sq("a8"), None, PieceKind::Queen)
            .expect("promotion available");
        assert_eq!(queen.promotion, Some(PieceKind::Queen));
        let knight = find_legal_move(
            &state,
            sq("a7"),
            sq("a8"),
            Some(PieceKind::Knight),
            PieceKind::Queen,
        )
        .expect("under-promotion available");
        assert_eq!(knight.promotion, Some(PieceKind::Knight));
        assert_eq!(knight.notation, "a7-a8=N");
    }

    #[test]
    fn en_passant_capture_is_generated() {
        let state = fen::parse("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").unwrap();
        let ep = find_legal_move(&state, sq("e5"), sq("d6"), None, PieceKind::Queen)
            .expect("en passant available");
        assert_eq!(ep.kind, MoveKind::EnPassant);
        assert_eq!(ep.captured, Some(Piece::new(Color::Black, PieceKind::Pawn)));
    }

    #[test]
    fn castling_blocked_while_in_check() {
        let state = fen::parse("4k3/8/8/8/8/8/8/R3K2r w Q - 0 1").unwrap();
        assert!(legal_moves(&state)
            .iter()
            .all(|mv| !matches!(mv.kind, MoveKind::Castle(_))));

        let open = fen::parse("4k3/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
        let castle = find_legal_move(&open, sq("e1"), sq("c1"), None, PieceKind::Queen)
            .expect("queen side castle");
        assert_eq!(castle.kind, MoveKind::Castle(CastleSide::QueenSide));
    }

    #[test]
    fn malformed_en_passant_target_is_ignored() {
        let state = fen::parse("4k3/8/8/8/8/8/8/4K3 w - e6 0 1").unwrap();
        assert_eq!(legal_moves(&state).len(), 5);
    }
}
