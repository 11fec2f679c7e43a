use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use timeweave_types::{
    board::{PieceKind, Square},
    game::{Move, Verdict},
    TimelineId, TimeweaveError,
};

/// A square on one board of the multiverse.
///
/// `ply` selects the board after that many moves of the timeline; `None`
/// means the current board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardPoint {
    pub timeline: TimelineId,
    pub ply: Option<usize>,
    pub square: Square,
}

impl BoardPoint {
    pub fn current(timeline: TimelineId, square: Square) -> Self {
        Self {
            timeline,
            ply: None,
            square,
        }
    }

    pub fn at(timeline: TimelineId, ply: usize, square: Square) -> Self {
        Self {
            timeline,
            ply: Some(ply),
            square,
        }
    }
}

impl fmt::Display for BoardPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ply {
            Some(ply) => write!(f, "T{}@{}:{}", self.timeline, ply, self.square),
            None => write!(f, "T{}:{}", self.timeline, self.square),
        }
    }
}

/// Accepts `e4` (timeline 0, current board), `T2:e4` and `T2@3:e4`.
impl FromStr for BoardPoint {
    type Err = TimeweaveError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let Some((board, square)) = text.split_once(':') else {
            return Ok(BoardPoint::current(0, Square::parse(text)?));
        };
        let square = Square::parse(square)?;
        let board = board
            .strip_prefix('T')
            .or_else(|| board.strip_prefix('t'))
            .ok_or_else(|| {
                TimeweaveError::validation(format!("'{board}' should look like T0 or T0@2"))
            })?;
        let point = match board.split_once('@') {
            Some((timeline, ply)) => BoardPoint::at(number(timeline)?, number(ply)?, square),
            None => BoardPoint::current(number(board)?, square),
        };
        Ok(point)
    }
}

fn number<T: FromStr>(part: &str) -> Result<T, TimeweaveError> {
    part.parse()
        .map_err(|_| TimeweaveError::validation(format!("'{part}' is not a number")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: BoardPoint,
    pub to: BoardPoint,
    pub promotion: Option<PieceKind>,
}

impl MoveRequest {
    pub fn new(from: BoardPoint, to: BoardPoint) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    /// Ordinary move on the current board of `timeline`.
    pub fn on_board(timeline: TimelineId, from: Square, to: Square) -> Self {
        Self::new(
            BoardPoint::current(timeline, from),
            BoardPoint::current(timeline, to),
        )
    }

    /// Request that reproduces a generated move on `timeline`.
    pub fn from_move(timeline: TimelineId, mv: &Move) -> Self {
        Self::on_board(timeline, mv.from, mv.to).with_promotion(mv.promotion)
    }

    pub fn with_promotion(mut self, promotion: Option<PieceKind>) -> Self {
        self.promotion = promotion;
        self
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "={}", kind.letter())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveClass {
    SameBoard,
    CrossTimeline,
    TimeTravel,
}

/// Result of a committed move.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMove {
    pub class: MoveClass,
    /// Every record appended, with the timeline it went to.
    pub records: Vec<(TimelineId, Move)>,
    pub created: Option<TimelineId>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Applied(AppliedMove),
    /// Nothing changed.
    Rejected { reason: String },
}

impl MoveOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MoveOutcome::Applied(_))
    }

    pub fn applied(&self) -> Option<&AppliedMove> {
        match self {
            MoveOutcome::Applied(applied) => Some(applied),
            MoveOutcome::Rejected { .. } => None,
        }
    }

    pub fn created(&self) -> Option<TimelineId> {
        self.applied().and_then(|applied| applied.created)
    }
}
