//! Positional notation codec.
//!
//! The layout is Forsyth-Edwards notation: placement, side to move, castling,
//! en passant, halfmove clock, fullmove number. Parsing is strict about syntax
//! and tolerant about material; impossible piece configurations are reported by
//! [`advisories`] and never rejected.

use serde::{Deserialize, Serialize};

use crate::{
    board::{Board, Color, Piece, PieceKind, Square, BOARD_SIZE},
    game::{CastlingRights, GameState},
    Result, TimeweaveError,
};

pub const STARTING_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

pub fn serialize(state: &GameState) -> String {
    let mut placement = String::new();
    for row in 0..BOARD_SIZE {
        if row > 0 {
            placement.push('/');
        }
        let mut gap = 0;
        for slot in state.board.row(row) {
            match slot {
                Some(piece) => {
                    if gap > 0 {
                        placement.push_str(&gap.to_string());
                        gap = 0;
                    }
                    placement.push(piece.fen_char());
                }
                None => gap += 1,
            }
        }
        if gap > 0 {
            placement.push_str(&gap.to_string());
        }
    }

    let side = match state.side_to_move {
        Color::White => "w",
        Color::Black => "b",
    };

    let rights = state.castling;
    let mut castling: String = [
        (rights.white_king_side, 'K'),
        (rights.white_queen_side, 'Q'),
        (rights.black_king_side, 'k'),
        (rights.black_queen_side, 'q'),
    ]
    .iter()
    .filter(|(allowed, _)| *allowed)
    .map(|(_, c)| *c)
    .collect();
    if castling.is_empty() {
        castling.push('-');
    }

    let en_passant = state
        .en_passant
        .map(|sq| sq.name())
        .unwrap_or_else(|| "-".into());

    format!(
        "{placement} {side} {castling} {en_passant} {} {}",
        state.halfmove_clock, state.fullmove_number
    )
}

/// Parses positional notation. Only placement and side to move are mandatory;
/// missing trailing fields default to `- - 0 1`.
pub fn parse(text: &str) -> Result<GameState> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() < 2 || fields.len() > 6 {
        return Err(TimeweaveError::validation(format!(
            "expected 2 to 6 fields, found {}",
            fields.len()
        )));
    }

    let board = parse_placement(fields[0])?;
    let side_to_move = match fields[1] {
        "w" => Color::White,
        "b" => Color::Black,
        other => {
            return Err(TimeweaveError::validation(format!(
                "unknown side to move '{other}'"
            )))
        }
    };
    let castling = fields.get(2).map_or(Ok(CastlingRights::NONE), |f| parse_castling(f))?;
    let en_passant = match fields.get(3) {
        None | Some(&"-") => None,
        Some(name) => Some(Square::parse(name)?),
    };
    let halfmove_clock = fields.get(4).map_or(Ok(0), |f| parse_counter(f, "halfmove"))?;
    let fullmove_number = fields.get(5).map_or(Ok(1), |f| parse_counter(f, "fullmove"))?;

    Ok(GameState {
        board,
        side_to_move,
        castling,
        en_passant,
        halfmove_clock,
        fullmove_number,
    })
}

fn parse_placement(field: &str) -> Result<Board> {
    let ranks: Vec<&str> = field.split('/').collect();
    if ranks.len() != BOARD_SIZE as usize {
        return Err(TimeweaveError::validation(format!(
            "placement has {} ranks, expected {BOARD_SIZE}",
            ranks.len()
        )));
    }

    let mut board = Board::empty();
    for (row, rank) in ranks.iter().enumerate() {
        let mut col: u32 = 0;
        for c in rank.chars() {
            if let Some(skip) = c.to_digit(10) {
                if skip == 0 || skip > BOARD_SIZE as u32 {
                    return Err(TimeweaveError::validation(format!(
                        "invalid gap '{c}' in rank {}",
                        BOARD_SIZE as usize - row
                    )));
                }
                col += skip;
            } else {
                let piece = Piece::from_fen_char(c).ok_or_else(|| {
                    TimeweaveError::validation(format!("unknown piece letter '{c}'"))
                })?;
                if col >= BOARD_SIZE as u32 {
                    return Err(overfull(row));
                }
                board.set_piece(Square::new(row as u8, col as u8), Some(piece));
                col += 1;
            }
            if col > BOARD_SIZE as u32 {
                return Err(overfull(row));
            }
        }
        if col != BOARD_SIZE as u32 {
            return Err(TimeweaveError::validation(format!(
                "rank {} describes {col} squares",
                BOARD_SIZE as usize - row
            )));
        }
    }
    Ok(board)
}

fn overfull(row: usize) -> TimeweaveError {
    TimeweaveError::validation(format!(
        "rank {} describes more than {BOARD_SIZE} squares",
        BOARD_SIZE as usize - row
    ))
}

fn parse_castling(field: &str) -> Result<CastlingRights> {
    let mut rights = CastlingRights::NONE;
    if field == "-" {
        return Ok(rights);
    }
    for c in field.chars() {
        let slot = match c {
            'K' => &mut rights.white_king_side,
            'Q' => &mut rights.white_queen_side,
            'k' => &mut rights.black_king_side,
            'q' => &mut rights.black_queen_side,
            other => {
                return Err(TimeweaveError::validation(format!(
                    "unknown castling flag '{other}'"
                )))
            }
        };
        *slot = true;
    }
    Ok(rights)
}

fn parse_counter(field: &str, name: &str) -> Result<u32> {
    field
        .parse()
        .map_err(|_| TimeweaveError::validation(format!("{name} counter '{field}' is not a number")))
}

/// Non-blocking observations about material that standard chess cannot reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advisory {
    MissingKing(Color),
    ExtraKings { color: Color, count: usize },
    ExcessPawns { color: Color, count: usize },
    PawnOnBackRank(Square),
}

pub fn advisories(state: &GameState) -> Vec<Advisory> {
    let mut notes = Vec::new();
    for color in [Color::White, Color::Black] {
        match state.board.kings(color).len() {
            0 => notes.push(Advisory::MissingKing(color)),
            1 => {}
            count => notes.push(Advisory::ExtraKings { color, count }),
        }
        let pawns = state.board.count(Piece::new(color, PieceKind::Pawn));
        if pawns > 8 {
            notes.push(Advisory::ExcessPawns {
                color,
                count: pawns,
            });
        }
    }
    notes.extend(
        state
            .board
            .pieces()
            .filter(|(sq, p)| p.kind == PieceKind::Pawn && (sq.row == 0 || sq.row == BOARD_SIZE - 1))
            .map(|(sq, _)| Advisory::PawnOnBackRank(sq)),
    );
    notes
}
