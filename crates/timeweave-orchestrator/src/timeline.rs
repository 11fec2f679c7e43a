//! A single linear game history.

use timeweave_engine::{apply_move, legal_moves, status};
use timeweave_types::{
    board::{Board, Color},
    game::{GameState, GameStatus, Move, Snapshot},
    persist::TimelineRecord,
    Result, TimelineId, TimeweaveError,
};
use tracing::{debug, warn};

/// One board's history: its starting position, every move made on it and the
/// position captured after each of those moves.
///
/// `moves` and `snapshots` always have the same length; the last snapshot (or
/// the initial state when there are none) is the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    id: TimelineId,
    parent_id: Option<TimelineId>,
    branch_turn: Option<usize>,
    display_offset: f32,
    initial_state: GameState,
    state: GameState,
    moves: Vec<Move>,
    snapshots: Vec<Snapshot>,
}

impl Timeline {
    pub(crate) fn new(
        id: TimelineId,
        parent_id: Option<TimelineId>,
        branch_turn: Option<usize>,
        display_offset: f32,
        initial_state: GameState,
    ) -> Self {
        Self {
            id,
            parent_id,
            branch_turn,
            display_offset,
            state: initial_state.clone(),
            initial_state,
            moves: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    pub fn parent_id(&self) -> Option<TimelineId> {
        self.parent_id
    }

    pub fn branch_turn(&self) -> Option<usize> {
        self.branch_turn
    }

    /// Vertical lane used by renderers: 0 for the root, positive for branches
    /// opened by white, negative for branches opened by black.
    pub fn display_offset(&self) -> f32 {
        self.display_offset
    }

    pub fn initial_state(&self) -> &GameState {
        &self.initial_state
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn board(&self) -> &Board {
        &self.state.board
    }

    pub fn side_to_move(&self) -> Color {
        self.state.side_to_move
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Number of moves made on this timeline.
    pub fn ply(&self) -> usize {
        self.moves.len()
    }

    pub fn positional_state(&self) -> String {
        self.state.to_fen()
    }

    /// Appends `mv`, recomputing the current state through the rule engine.
    ///
    /// Nothing is touched when the engine refuses the move.
    pub fn apply_move(&mut self, mv: Move) -> Result<()> {
        let next = apply_move(&self.state, &mv)?;
        debug!("Timeline {} plays {}", self.id, mv.notation);
        self.moves.push(mv);
        self.snapshots.push(Snapshot::Full(next.clone()));
        self.state = next;
        self.check_invariant()
    }

    /// Snapshot captured after move `turn` (zero-based).
    pub fn snapshot_at(&self, turn: usize) -> Result<&Snapshot> {
        self.snapshots.get(turn).ok_or(TimeweaveError::OutOfRange {
            index: turn,
            len: self.snapshots.len(),
        })
    }

    /// Full position after `ply` moves: 0 is the initial state, `ply()` the
    /// current one.
    pub fn state_at(&self, ply: usize) -> Result<GameState> {
        if ply == 0 {
            return Ok(self.initial_state.clone());
        }
        if ply > self.moves.len() {
            return Err(TimeweaveError::OutOfRange {
                index: ply,
                len: self.moves.len() + 1,
            });
        }
        Ok(match &self.snapshots[ply - 1] {
            Snapshot::Full(state) => state.clone(),
            Snapshot::Legacy(board) => {
                GameState::from_board(board.clone(), self.moves[ply - 1].color().opponent())
            }
        })
    }

    /// Independent copy of the position after `ply` moves, used as the starting
    /// point of a new branch.
    pub fn clone_for_branch(&self, ply: usize) -> Result<GameState> {
        self.state_at(ply)
    }

    pub fn is_current(&self, ply: usize) -> bool {
        ply == self.moves.len()
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.state)
    }

    pub fn status(&self) -> GameStatus {
        status(&self.state)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub(crate) fn restore(&mut self, state: GameState) {
        self.state = state;
    }

    pub(crate) fn restore_history(&mut self, moves: Vec<Move>, snapshots: Vec<Snapshot>) {
        self.moves = moves;
        self.snapshots = snapshots;
    }

    pub(crate) fn check_invariant(&self) -> Result<()> {
        if self.moves.len() != self.snapshots.len() {
            return Err(TimeweaveError::Invariant(format!(
                "timeline {} has {} moves but {} snapshots",
                self.id,
                self.moves.len(),
                self.snapshots.len()
            )));
        }
        Ok(())
    }

    /// Rewrites bare-board snapshots as full states by replaying the history
    /// from the initial position. Returns how many snapshots were rewritten.
    ///
    /// Where replay disagrees with a stored board, the stored board wins and the
    /// rest of the rule state is reset.
    pub(crate) fn migrate_legacy_snapshots(&mut self) -> usize {
        let mut replayed = Some(self.initial_state.clone());
        let mut migrated = 0;
        for (mv, snapshot) in self.moves.iter().zip(self.snapshots.iter_mut()) {
            let next = replayed
                .as_ref()
                .and_then(|state| apply_move(state, mv).ok());
            if let Snapshot::Legacy(board) = snapshot {
                let state = match next {
                    Some(ref state) if state.board == *board => state.clone(),
                    _ => GameState::from_board(board.clone(), mv.color().opponent()),
                };
                *snapshot = Snapshot::Full(state);
                migrated += 1;
            }
            replayed = match snapshot {
                Snapshot::Full(state) => Some(state.clone()),
                Snapshot::Legacy(_) => next,
            };
        }
        if migrated > 0 {
            warn!(
                "Timeline {} migrated {migrated} legacy snapshots",
                self.id
            );
        }
        migrated
    }

    pub fn to_record(&self) -> TimelineRecord {
        TimelineRecord {
            id: self.id,
            parent_id: self.parent_id,
            branch_turn: self.branch_turn,
            display_offset: self.display_offset,
            initial_fen: self.initial_state.to_fen(),
            fen: self.state.to_fen(),
            moves: self.moves.clone(),
            snapshots: self.snapshots.clone(),
        }
    }

    pub fn from_record(record: &TimelineRecord) -> Result<Self> {
        let initial_state = GameState::from_fen(&record.initial_fen)?;
        let state = GameState::from_fen(&record.fen)?;
        let mut timeline = Timeline::new(
            record.id,
            record.parent_id,
            record.branch_turn,
            record.display_offset,
            initial_state,
        );
        timeline.restore(state);
        timeline.restore_history(record.moves.clone(), record.snapshots.clone());
        timeline.check_invariant()?;
        timeline.migrate_legacy_snapshots();
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeweave_engine::find_legal_move;
    use timeweave_types::board::{PieceKind, Square};

    fn sq(name: &str) -> Square {
        Square::parse(name).unwrap()
    }

    fn play(timeline: &mut Timeline, from: &str, to: &str) {
        let mv = find_legal_move(timeline.state(), sq(from), sq(to), None, PieceKind::Queen)
            .unwrap_or_else(|| panic!("{from}-{to} should be legal"));
        timeline.apply_move(mv).expect("apply");
    }

    fn root() -> Timeline {
        Timeline::new(0, None, None, 0.0, GameState::initial())
    }

    #[test]
    fn moves_and_snapshots_grow_together() {
        let mut timeline = root();
        play(&mut timeline, "e2", "e4");
        play(&mut timeline, "e7", "e5");
        assert_eq!(timeline.ply(), 2);
        assert_eq!(timeline.snapshots().len(), 2);
        assert_eq!(timeline.snapshot_at(1).unwrap().board(), timeline.board());
        assert_eq!(timeline.side_to_move(), Color::White);
    }

    #[test]
    fn snapshot_index_is_bounds_checked() {
        let mut timeline = root();
        assert!(matches!(
            timeline.snapshot_at(0),
            Err(TimeweaveError::OutOfRange { index: 0, len: 0 })
        ));
        play(&mut timeline, "d2", "d4");
        assert!(timeline.snapshot_at(0).is_ok());
        assert!(timeline.snapshot_at(1).is_err());
    }

    #[test]
    fn refused_move_leaves_timeline_untouched() {
        let mut timeline = root();
        let mv = find_legal_move(timeline.state(), sq("e2"), sq("e4"), None, PieceKind::Queen)
            .unwrap();
        play(&mut timeline, "e2", "e4");
        let before = timeline.clone();
        assert!(timeline.apply_move(mv).is_err());
        assert_eq!(timeline, before);
    }

    #[test]
    fn branch_copies_are_independent() {
        let mut timeline = root();
        play(&mut timeline, "e2", "e4");
        play(&mut timeline, "e7", "e5");

        assert_eq!(timeline.clone_for_branch(0).unwrap(), GameState::initial());
        let mut after_first = timeline.clone_for_branch(1).unwrap();
        assert_eq!(after_first.side_to_move, Color::Black);
        after_first.board.take(sq("e4"));
        assert!(timeline.snapshot_at(0).unwrap().board().piece_at(sq("e4")).is_some());
        assert_eq!(timeline.clone_for_branch(2).unwrap(), *timeline.state());
        assert!(timeline.clone_for_branch(3).is_err());
    }

    #[test]
    fn legacy_snapshots_migrate_by_replay() {
        let mut timeline = root();
        play(&mut timeline, "e2", "e4");
        play(&mut timeline, "e7", "e5");
        let expected = timeline.snapshots().to_vec();

        let mut record = timeline.to_record();
        record.snapshots = expected
            .iter()
            .map(|s| Snapshot::Legacy(s.board().clone()))
            .collect();
        let restored = Timeline::from_record(&record).expect("restore");
        assert_eq!(restored.snapshots(), expected.as_slice());
        assert_eq!(restored.state(), timeline.state());
    }

    #[test]
    fn mismatched_record_is_rejected() {
        let mut timeline = root();
        play(&mut timeline, "g1", "f3");
        let mut record = timeline.to_record();
        record.snapshots.clear();
        assert!(matches!(
            Timeline::from_record(&record),
            Err(TimeweaveError::Invariant(_))
        ));
    }
}
