use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, TimeweaveError};

pub const BOARD_SIZE: u8 = 8;

const FILES: [char; 8] = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

/// Represents the two players in a chess game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn is_white(self) -> bool {
        self == Color::White
    }

    /// Row delta of a single pawn step. Row 0 is rank 8, so white walks upwards.
    pub fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    pub fn home_row(self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }

    pub fn pawn_row(self) -> u8 {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }

    pub fn promotion_row(self) -> u8 {
        self.opponent().home_row()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

/// Piece kind in orthodox chess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const PROMOTIONS: [PieceKind; 4] = [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ];

    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'P' => Some(PieceKind::Pawn),
            'N' => Some(PieceKind::Knight),
            'B' => Some(PieceKind::Bishop),
            'R' => Some(PieceKind::Rook),
            'Q' => Some(PieceKind::Queen),
            'K' => Some(PieceKind::King),
            _ => None,
        }
    }

    pub fn is_promotion_target(self) -> bool {
        Self::PROMOTIONS.contains(&self)
    }
}

/// Piece value: compared by colour and kind, never by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub const fn new(color: Color, kind: PieceKind) -> Self {
        Self { color, kind }
    }

    /// Positional-notation letter: uppercase for white, lowercase for black.
    pub fn fen_char(self) -> char {
        let letter = self.kind.letter();
        match self.color {
            Color::White => letter,
            Color::Black => letter.to_ascii_lowercase(),
        }
    }

    pub fn from_fen_char(c: char) -> Option<Self> {
        let kind = PieceKind::from_letter(c)?;
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Self { color, kind })
    }
}

/// Board coordinate. Row 0 is rank 8, column 0 is the a-file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Square {
    pub row: u8,
    pub col: u8,
}

impl Square {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub fn try_new(row: i32, col: i32) -> Result<Self> {
        let size = BOARD_SIZE as i32;
        if (0..size).contains(&row) && (0..size).contains(&col) {
            Ok(Self::new(row as u8, col as u8))
        } else {
            Err(TimeweaveError::validation(format!(
                "square ({row}, {col}) is outside the board"
            )))
        }
    }

    pub fn offset(&self, dr: i8, dc: i8) -> Option<Square> {
        let nr = self.row as i16 + dr as i16;
        let nc = self.col as i16 + dc as i16;
        if nr >= 0 && nc >= 0 && nr < BOARD_SIZE as i16 && nc < BOARD_SIZE as i16 {
            Some(Square::new(nr as u8, nc as u8))
        } else {
            None
        }
    }

    pub fn rank(&self) -> u8 {
        BOARD_SIZE - self.row
    }

    pub fn file(&self) -> char {
        FILES[self.col as usize % FILES.len()]
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.file(), self.rank())
    }

    pub fn parse(name: &str) -> Result<Self> {
        let mut chars = name.trim().chars();
        let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(TimeweaveError::validation(format!(
                "malformed square name '{name}'"
            )));
        };
        let col = FILES
            .iter()
            .position(|f| *f == file.to_ascii_lowercase())
            .ok_or_else(|| TimeweaveError::validation(format!("unknown file '{file}'")))?;
        let rank = rank
            .to_digit(10)
            .filter(|r| (1..=BOARD_SIZE as u32).contains(r))
            .ok_or_else(|| TimeweaveError::validation(format!("unknown rank '{rank}'")))?;
        Ok(Square::new(BOARD_SIZE - rank as u8, col as u8))
    }

    /// Every square in row-major order, starting at a8.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Square::new(row, col)))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

impl FromStr for Square {
    type Err = TimeweaveError;

    fn from_str(s: &str) -> Result<Self> {
        Square::parse(s)
    }
}

/// Name of the square at `(row, col)`, e.g. `(7, 4)` is `e1`.
pub fn to_square_name(row: i32, col: i32) -> Result<String> {
    Square::try_new(row, col).map(|sq| sq.name())
}

/// Inverse of [`to_square_name`], returning `(row, col)`.
pub fn from_square_name(name: &str) -> Result<(u8, u8)> {
    Square::parse(name).map(|sq| (sq.row, sq.col))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDiff {
    pub square: Square,
    pub before: Option<Piece>,
    pub after: Option<Piece>,
}

/// 8x8 grid of optional pieces.
///
/// Piece counts are not policed here: cross-timeline and time-travel moves
/// legitimately produce boards with extra queens or a missing king. The grid is
/// stored inline, so `clone` never shares structure with the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut board = Self::empty();
        board.setup_initial_positions();
        board
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares
            .get(square.row as usize)
            .and_then(|row| row.get(square.col as usize))
            .copied()
            .flatten()
    }

    /// Places `piece` (or clears the square) and returns the previous occupant.
    pub fn set_piece(&mut self, square: Square, piece: Option<Piece>) -> Option<Piece> {
        match self
            .squares
            .get_mut(square.row as usize)
            .and_then(|row| row.get_mut(square.col as usize))
        {
            Some(slot) => std::mem::replace(slot, piece),
            None => None,
        }
    }

    pub fn take(&mut self, square: Square) -> Option<Piece> {
        self.set_piece(square, None)
    }

    pub fn move_piece(&mut self, from: Square, to: Square) -> Result<Option<Piece>> {
        let moving = self
            .piece_at(from)
            .ok_or_else(|| TimeweaveError::validation(format!("no piece on {from}")))?;
        self.take(from);
        Ok(self.set_piece(to, Some(moving)))
    }

    pub fn is_empty(&self, square: Square) -> bool {
        self.piece_at(square).is_none()
    }

    pub fn row(&self, row: u8) -> &[Option<Piece>; 8] {
        &self.squares[row as usize % BOARD_SIZE as usize]
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.piece_at(sq).map(|p| (sq, p)))
    }

    pub fn count(&self, piece: Piece) -> usize {
        self.pieces().filter(|(_, p)| *p == piece).count()
    }

    pub fn kings(&self, color: Color) -> Vec<Square> {
        self.pieces()
            .filter(|(_, p)| p.color == color && p.kind == PieceKind::King)
            .map(|(sq, _)| sq)
            .collect()
    }

    pub fn differences(&self, other: &Board) -> Vec<BoardDiff> {
        Square::all()
            .filter_map(|square| {
                let before = self.piece_at(square);
                let after = other.piece_at(square);
                (before != after).then_some(BoardDiff {
                    square,
                    before,
                    after,
                })
            })
            .collect()
    }

    fn setup_initial_positions(&mut self) {
        use PieceKind::*;

        let back_rank = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];

        for color in [Color::White, Color::Black] {
            for (col, kind) in back_rank.iter().enumerate() {
                self.set_piece(
                    Square::new(color.home_row(), col as u8),
                    Some(Piece::new(color, *kind)),
                );
                self.set_piece(
                    Square::new(color.pawn_row(), col as u8),
                    Some(Piece::new(color, Pawn)),
                );
            }
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..BOARD_SIZE {
            write!(f, "{} ", BOARD_SIZE - row)?;
            for col in 0..BOARD_SIZE {
                let c = self
                    .piece_at(Square::new(row, col))
                    .map(Piece::fen_char)
                    .unwrap_or('.');
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        write!(f, "   a b c d e f g h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_names_follow_rank_orientation() {
        assert_eq!(to_square_name(0, 0).unwrap(), "a8");
        assert_eq!(to_square_name(7, 7).unwrap(), "h1");
        assert_eq!(to_square_name(4, 4).unwrap(), "e4");
        assert_eq!(from_square_name("e1").unwrap(), (7, 4));
        assert_eq!(from_square_name("H8").unwrap(), (0, 7));
    }

    #[test]
    fn square_names_reject_out_of_range() {
        assert!(to_square_name(-1, 0).is_err());
        assert!(to_square_name(0, 8).is_err());
        assert!(from_square_name("i1").is_err());
        assert!(from_square_name("a9").is_err());
        assert!(from_square_name("a10").is_err());
        assert!(from_square_name("").is_err());
    }

    #[test]
    fn offset_stays_on_board() {
        let corner = Square::new(0, 0);
        assert!(corner.offset(-1, 0).is_none());
        assert_eq!(corner.offset(1, 1), Some(Square::new(1, 1)));
    }

    #[test]
    fn opponent_switch() {
        assert_eq!(Color::White.opponent(), Color::Black);
        assert_eq!(Color::Black.opponent(), Color::White);
    }

    #[test]
    fn initial_board_setup() {
        let board = Board::standard();
        let king = board.piece_at("e1".parse().unwrap()).expect("white king");
        assert_eq!(king, Piece::new(Color::White, PieceKind::King));
        let queen = board.piece_at("d8".parse().unwrap()).expect("black queen");
        assert_eq!(queen, Piece::new(Color::Black, PieceKind::Queen));
        assert_eq!(board.pieces().count(), 32);
        assert_eq!(board.kings(Color::Black), vec![Square::parse("e8").unwrap()]);
    }

    #[test]
    fn clone_is_independent() {
        let original = Board::standard();
        let mut copy = original.clone();
        copy.take(Square::parse("e2").unwrap());
        assert!(original.piece_at(Square::parse("e2").unwrap()).is_some());
        assert_ne!(original, copy);
    }

    #[test]
    fn board_differences_detect_changes() {
        let a = Board::standard();
        let mut b = a.clone();
        let from = Square::parse("e2").unwrap();
        let to = Square::parse("e4").unwrap();
        b.move_piece(from, to).unwrap();
        let diffs = a.differences(&b);
        assert_eq!(diffs.len(), 2);
        assert!(diffs.iter().any(|d| d.square == from && d.after.is_none()));
        assert!(diffs.iter().any(|d| d.square == to && d.before.is_none()));
    }
}
