use timeweave_types::board::{Board, Color, Piece, PieceKind, Square};

pub const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

pub const KING_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

pub const ROOK_DIRECTIONS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
pub const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

/// True iff `target` is attacked by any piece of colour `by`.
///
/// Works on any material: every attacker on the board is considered, so extra
/// queens or several kings attack like any other piece.
pub fn is_square_attacked(board: &Board, target: Square, by: Color) -> bool {
    // A pawn attacks diagonally forward, so look one step backwards from the target.
    for dc in [-1, 1] {
        if let Some(sq) = target.offset(-by.forward(), dc) {
            if board.piece_at(sq) == Some(Piece::new(by, PieceKind::Pawn)) {
                return true;
            }
        }
    }

    let hits = |offsets: &[(i8, i8)], kind: PieceKind| {
        offsets.iter().any(|&(dr, dc)| {
            target
                .offset(dr, dc)
                .and_then(|sq| board.piece_at(sq))
                .map_or(false, |p| p == Piece::new(by, kind))
        })
    };
    if hits(&KNIGHT_OFFSETS, PieceKind::Knight) || hits(&KING_OFFSETS, PieceKind::King) {
        return true;
    }

    ray_attacked(board, target, by, &ROOK_DIRECTIONS, PieceKind::Rook)
        || ray_attacked(board, target, by, &BISHOP_DIRECTIONS, PieceKind::Bishop)
}

fn ray_attacked(
    board: &Board,
    target: Square,
    by: Color,
    directions: &[(i8, i8)],
    slider: PieceKind,
) -> bool {
    for &(dr, dc) in directions {
        let mut cur = target;
        while let Some(next) = cur.offset(dr, dc) {
            cur = next;
            if let Some(piece) = board.piece_at(cur) {
                if piece.color == by && (piece.kind == slider || piece.kind == PieceKind::Queen) {
                    return true;
                }
                break;
            }
        }
    }
    false
}
