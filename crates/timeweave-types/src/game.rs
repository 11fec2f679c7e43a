use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    board::{Board, Color, Piece, PieceKind, Square},
    fen, Result, TimelineId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastleSide {
    KingSide,
    QueenSide,
}

impl CastleSide {
    pub fn rook_col(self) -> u8 {
        match self {
            CastleSide::KingSide => 7,
            CastleSide::QueenSide => 0,
        }
    }

    pub fn king_target_col(self) -> u8 {
        match self {
            CastleSide::KingSide => 6,
            CastleSide::QueenSide => 2,
        }
    }

    pub fn rook_target_col(self) -> u8 {
        match self {
            CastleSide::KingSide => 5,
            CastleSide::QueenSide => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    pub const ALL: CastlingRights = CastlingRights {
        white_king_side: true,
        white_queen_side: true,
        black_king_side: true,
        black_queen_side: true,
    };

    pub const NONE: CastlingRights = CastlingRights {
        white_king_side: false,
        white_queen_side: false,
        black_king_side: false,
        black_queen_side: false,
    };

    pub fn get(&self, color: Color, side: CastleSide) -> bool {
        match (color, side) {
            (Color::White, CastleSide::KingSide) => self.white_king_side,
            (Color::White, CastleSide::QueenSide) => self.white_queen_side,
            (Color::Black, CastleSide::KingSide) => self.black_king_side,
            (Color::Black, CastleSide::QueenSide) => self.black_queen_side,
        }
    }

    pub fn revoke(&mut self, color: Color, side: CastleSide) {
        let slot = match (color, side) {
            (Color::White, CastleSide::KingSide) => &mut self.white_king_side,
            (Color::White, CastleSide::QueenSide) => &mut self.white_queen_side,
            (Color::Black, CastleSide::KingSide) => &mut self.black_king_side,
            (Color::Black, CastleSide::QueenSide) => &mut self.black_queen_side,
        };
        *slot = false;
    }

    pub fn revoke_all(&mut self, color: Color) {
        self.revoke(color, CastleSide::KingSide);
        self.revoke(color, CastleSide::QueenSide);
    }

    pub fn any(&self) -> bool {
        self.white_king_side || self.white_queen_side || self.black_king_side || self.black_queen_side
    }
}

/// Full position of one timeline: board plus the side-to-move and rule state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameState {
    pub board: Board,
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl GameState {
    pub fn initial() -> Self {
        Self {
            board: Board::standard(),
            side_to_move: Color::White,
            castling: CastlingRights::ALL,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Wraps a bare board with no castling rights or en-passant target.
    pub fn from_board(board: Board, side_to_move: Color) -> Self {
        Self {
            board,
            side_to_move,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn from_fen(text: &str) -> Result<Self> {
        fen::parse(text)
    }

    pub fn to_fen(&self) -> String {
        fen::serialize(self)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::initial()
    }
}

/// How a move record advances its timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    Normal,
    Castle(CastleSide),
    EnPassant,
    /// The piece left this board for another timeline.
    Departure { destination: TimelineId },
    /// The piece entered this board from another timeline.
    Arrival { origin: TimelineId },
}

/// One entry of a timeline's append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub promotion: Option<PieceKind>,
    pub is_white: bool,
    pub notation: String,
    pub kind: MoveKind,
}

impl Move {
    pub fn color(&self) -> Color {
        if self.is_white {
            Color::White
        } else {
            Color::Black
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.notation)
    }
}

/// Board capture taken after a move.
///
/// Early saves stored only the board; those load as `Legacy` and are migrated to
/// `Full` by the registry before any timeline uses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "data", rename_all = "snake_case")]
pub enum Snapshot {
    Legacy(Board),
    Full(GameState),
}

impl Snapshot {
    pub fn board(&self) -> &Board {
        match self {
            Snapshot::Legacy(board) => board,
            Snapshot::Full(state) => &state.board,
        }
    }

    pub fn state(&self) -> Option<&GameState> {
        match self {
            Snapshot::Legacy(_) => None,
            Snapshot::Full(state) => Some(state),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Snapshot::Legacy(_))
    }
}

/// Per-position outcome for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    InPlay,
    Checkmate,
    Stalemate,
    /// Side to move has no king or several kings; mate cannot be judged.
    Indeterminate,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Checkmate | GameStatus::Stalemate)
    }
}

/// Outcome of the whole multiverse, aggregated across every timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Continue,
    Win(Color),
    Draw,
}
