//! Long algebraic notation for move records.

use timeweave_types::{
    board::{Piece, PieceKind, Square},
    game::{CastleSide, MoveKind},
    TimelineId,
};

fn letter(piece: Piece) -> String {
    match piece.kind {
        PieceKind::Pawn => String::new(),
        kind => kind.letter().to_string(),
    }
}

fn promotion_suffix(promotion: Option<PieceKind>) -> String {
    promotion
        .map(|kind| format!("={}", kind.letter()))
        .unwrap_or_default()
}

/// `Ng1-f3`, `e5xd6`, `e7-e8=Q`, `O-O`. Transfer kinds delegate to
/// [`departure`] and [`arrival`].
pub fn describe(
    kind: MoveKind,
    piece: Piece,
    from: Square,
    to: Square,
    captured: Option<Piece>,
    promotion: Option<PieceKind>,
) -> String {
    match kind {
        MoveKind::Castle(CastleSide::KingSide) => "O-O".into(),
        MoveKind::Castle(CastleSide::QueenSide) => "O-O-O".into(),
        MoveKind::Departure { destination } => departure(piece, from, destination),
        MoveKind::Arrival { origin } => arrival(piece, to, origin, captured, promotion),
        MoveKind::Normal | MoveKind::EnPassant => {
            let sep = if captured.is_some() { 'x' } else { '-' };
            format!(
                "{}{from}{sep}{to}{}",
                letter(piece),
                promotion_suffix(promotion)
            )
        }
    }
}

pub fn departure(piece: Piece, from: Square, destination: TimelineId) -> String {
    format!("{}{from}>>T{destination}", letter(piece))
}

pub fn arrival(
    piece: Piece,
    to: Square,
    origin: TimelineId,
    captured: Option<Piece>,
    promotion: Option<PieceKind>,
) -> String {
    let capture = if captured.is_some() { "x" } else { "" };
    format!(
        "T{origin}>>{}{capture}{to}{}",
        letter(piece),
        promotion_suffix(promotion)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeweave_types::board::Color;

    fn sq(name: &str) -> Square {
        Square::parse(name).unwrap()
    }

    #[test]
    fn ordinary_moves() {
        let knight = Piece::new(Color::White, PieceKind::Knight);
        let pawn = Piece::new(Color::White, PieceKind::Pawn);
        let rook = Piece::new(Color::Black, PieceKind::Rook);
        assert_eq!(
            describe(MoveKind::Normal, knight, sq("g1"), sq("f3"), None, None),
            "Ng1-f3"
        );
        assert_eq!(
            describe(MoveKind::Normal, pawn, sq("e7"), sq("d8"), Some(rook), Some(PieceKind::Queen)),
            "e7xd8=Q"
        );
        assert_eq!(
            describe(
                MoveKind::Castle(CastleSide::QueenSide),
                Piece::new(Color::White, PieceKind::King),
                sq("e1"),
                sq("c1"),
                None,
                None
            ),
            "O-O-O"
        );
    }

    #[test]
    fn transfer_moves() {
        let knight = Piece::new(Color::White, PieceKind::Knight);
        let pawn = Piece::new(Color::Black, PieceKind::Pawn);
        assert_eq!(departure(knight, sq("f3"), 2), "Nf3>>T2");
        assert_eq!(arrival(knight, sq("e5"), 1, Some(pawn), None), "T1>>Nxe5");
        assert_eq!(arrival(pawn, sq("a1"), 4, None, Some(PieceKind::Queen)), "T4>>a1=Q");
    }
}
