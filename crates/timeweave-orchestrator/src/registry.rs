//! Id-keyed store of every timeline in a session.

use std::collections::BTreeMap;

use timeweave_types::{
    board::Color,
    game::{GameState, GameStatus, Verdict},
    persist::SavedSession,
    Result, TimelineId, TimeweaveError,
};
use tracing::{debug, info};

use crate::timeline::Timeline;

#[derive(Debug, Clone, Default)]
pub struct TimelineRegistry {
    timelines: BTreeMap<TimelineId, Timeline>,
    next_id: TimelineId,
}

impl TimelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new timeline under a fresh id. Ids are never reused, even
    /// after deletion.
    ///
    /// The display lane is chosen from the side that opened the branch: the
    /// side to move in `initial_state`.
    pub fn create(
        &mut self,
        parent_id: Option<TimelineId>,
        branch_turn: Option<usize>,
        initial_state: GameState,
    ) -> Result<&mut Timeline> {
        if let Some(parent) = parent_id {
            let parent_timeline = self.require(parent)?;
            if let Some(turn) = branch_turn {
                if turn > parent_timeline.ply() {
                    return Err(TimeweaveError::OutOfRange {
                        index: turn,
                        len: parent_timeline.ply() + 1,
                    });
                }
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let offset = self.next_lane(initial_state.side_to_move);
        debug!(
            "Created timeline {id} (parent {parent_id:?}, turn {branch_turn:?}, lane {offset})"
        );
        let timeline = Timeline::new(id, parent_id, branch_turn, offset, initial_state);
        Ok(self.timelines.entry(id).or_insert(timeline))
    }

    fn next_lane(&self, opener: Color) -> f32 {
        if self.timelines.is_empty() {
            return 0.0;
        }
        let offsets = self.timelines.values().map(Timeline::display_offset);
        match opener {
            Color::White => offsets.fold(0.0, f32::max) + 1.0,
            Color::Black => offsets.fold(0.0, f32::min) - 1.0,
        }
    }

    pub fn get(&self, id: TimelineId) -> Option<&Timeline> {
        self.timelines.get(&id)
    }

    pub fn get_mut(&mut self, id: TimelineId) -> Option<&mut Timeline> {
        self.timelines.get_mut(&id)
    }

    pub fn require(&self, id: TimelineId) -> Result<&Timeline> {
        self.get(id).ok_or(TimeweaveError::UnknownTimeline(id))
    }

    pub fn require_mut(&mut self, id: TimelineId) -> Result<&mut Timeline> {
        self.get_mut(id).ok_or(TimeweaveError::UnknownTimeline(id))
    }

    /// Removes a timeline. Deleting an unknown id is a no-op.
    pub fn delete(&mut self, id: TimelineId) -> Option<Timeline> {
        let removed = self.timelines.remove(&id);
        if removed.is_some() {
            debug!("Deleted timeline {id}");
        }
        removed
    }

    pub fn contains(&self, id: TimelineId) -> bool {
        self.timelines.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    pub fn next_id(&self) -> TimelineId {
        self.next_id
    }

    pub fn ids(&self) -> impl Iterator<Item = TimelineId> + '_ {
        self.timelines.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timeline> {
        self.timelines.values()
    }

    /// Branches whose parent is `id`, in creation order.
    pub fn children(&self, id: TimelineId) -> Vec<TimelineId> {
        self.iter()
            .filter(|t| t.parent_id() == Some(id))
            .map(Timeline::id)
            .collect()
    }

    /// Timelines waiting on `color` that can still be played.
    pub fn active_timelines(&self, color: Color) -> Vec<&Timeline> {
        self.iter()
            .filter(|t| t.side_to_move() == color && !t.is_terminal())
            .collect()
    }

    /// Aggregate outcome across all timelines.
    ///
    /// A side is out of play when every timeline waiting on it has no legal
    /// move. It then loses if at least one of those is checkmate and draws
    /// otherwise.
    pub fn verdict(&self) -> Verdict {
        for color in [Color::White, Color::Black] {
            let waiting: Vec<&Timeline> = self
                .iter()
                .filter(|t| t.side_to_move() == color)
                .collect();
            if waiting.is_empty() || waiting.iter().any(|t| !t.legal_moves().is_empty()) {
                continue;
            }
            return if waiting.iter().any(|t| t.status() == GameStatus::Checkmate) {
                Verdict::Win(color.opponent())
            } else {
                Verdict::Draw
            };
        }
        Verdict::Continue
    }

    pub fn to_saved(&self) -> SavedSession {
        SavedSession::new(self.next_id, self.iter().map(Timeline::to_record).collect())
    }

    /// Rebuilds a registry from a save, migrating bare-board snapshots.
    pub fn from_saved(saved: &SavedSession) -> Result<Self> {
        saved.validate()?;
        let mut registry = TimelineRegistry {
            timelines: BTreeMap::new(),
            next_id: saved.next_id,
        };
        for record in &saved.timelines {
            let timeline = Timeline::from_record(record)?;
            registry.timelines.insert(timeline.id(), timeline);
        }
        info!(
            "Restored {} timelines (next id {})",
            registry.len(),
            registry.next_id
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeweave_engine::find_legal_move;
    use timeweave_types::{
        board::{PieceKind, Square},
        fen,
        game::Snapshot,
    };

    fn play(registry: &mut TimelineRegistry, id: TimelineId, from: &str, to: &str) {
        let timeline = registry.require_mut(id).unwrap();
        let mv = find_legal_move(
            timeline.state(),
            Square::parse(from).unwrap(),
            Square::parse(to).unwrap(),
            None,
            PieceKind::Queen,
        )
        .unwrap_or_else(|| panic!("{from}-{to} should be legal"));
        timeline.apply_move(mv).unwrap();
    }

    #[test]
    fn ids_are_fresh_and_never_reused() {
        let mut registry = TimelineRegistry::new();
        let root = registry.create(None, None, GameState::initial()).unwrap().id();
        let branch = registry
            .create(Some(root), Some(0), GameState::initial())
            .unwrap()
            .id();
        assert_eq!((root, branch), (0, 1));
        assert!(registry.delete(branch).is_some());
        assert!(registry.delete(branch).is_none());
        let again = registry.create(Some(root), Some(0), GameState::initial()).unwrap().id();
        assert_eq!(again, 2);
        assert_eq!(registry.children(root), vec![2]);
    }

    #[test]
    fn creation_checks_parent_and_turn() {
        let mut registry = TimelineRegistry::new();
        assert!(matches!(
            registry.create(Some(4), Some(0), GameState::initial()),
            Err(TimeweaveError::UnknownTimeline(4))
        ));
        let root = registry.create(None, None, GameState::initial()).unwrap().id();
        assert!(registry.create(Some(root), Some(1), GameState::initial()).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lanes_fan_out_by_opening_side() {
        let mut registry = TimelineRegistry::new();
        let root = registry.create(None, None, GameState::initial()).unwrap().id();
        let mut black_opens = GameState::initial();
        black_opens.side_to_move = Color::Black;

        let w1 = registry.create(Some(root), Some(0), GameState::initial()).unwrap().id();
        let b1 = registry.create(Some(root), Some(0), black_opens.clone()).unwrap().id();
        let w2 = registry.create(Some(root), Some(0), GameState::initial()).unwrap().id();
        let b2 = registry.create(Some(root), Some(0), black_opens).unwrap().id();

        let lane = |id| registry.get(id).unwrap().display_offset();
        assert_eq!(lane(root), 0.0);
        assert_eq!(lane(w1), 1.0);
        assert_eq!(lane(b1), -1.0);
        assert_eq!(lane(w2), 2.0);
        assert_eq!(lane(b2), -2.0);
    }

    #[test]
    fn mate_on_any_waiting_timeline_decides_the_game() {
        let mut registry = TimelineRegistry::new();
        let root = registry.create(None, None, GameState::initial()).unwrap().id();
        assert_eq!(registry.verdict(), Verdict::Continue);
        for (from, to) in [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")] {
            play(&mut registry, root, from, to);
        }
        assert_eq!(registry.verdict(), Verdict::Win(Color::Black));
    }

    #[test]
    fn other_playable_timeline_keeps_the_game_going() {
        let mut registry = TimelineRegistry::new();
        let root = registry.create(None, None, GameState::initial()).unwrap().id();
        for (from, to) in [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")] {
            play(&mut registry, root, from, to);
        }
        registry.create(Some(root), Some(0), GameState::initial()).unwrap();
        assert_eq!(registry.verdict(), Verdict::Continue);
        assert_eq!(registry.active_timelines(Color::White).len(), 1);
    }

    #[test]
    fn stalemate_everywhere_is_a_draw() {
        let mut registry = TimelineRegistry::new();
        let stalemate = fen::parse("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        registry.create(None, None, stalemate).unwrap();
        assert_eq!(registry.verdict(), Verdict::Draw);
    }

    #[test]
    fn saved_registry_restores_with_same_counter() {
        let mut registry = TimelineRegistry::new();
        let root = registry.create(None, None, GameState::initial()).unwrap().id();
        play(&mut registry, root, "e2", "e4");
        let branch = registry
            .create(Some(root), Some(0), GameState::initial())
            .unwrap()
            .id();
        registry.delete(branch);

        let mut saved = registry.to_saved();
        assert_eq!(saved.next_id, 2);
        saved.timelines[0].snapshots[0] =
            Snapshot::Legacy(saved.timelines[0].snapshots[0].board().clone());

        let restored = TimelineRegistry::from_saved(&saved).expect("restore");
        assert_eq!(restored.next_id(), 2);
        assert_eq!(
            restored.get(root).unwrap().snapshots(),
            registry.get(root).unwrap().snapshots()
        );
        assert!(!restored.contains(branch));
    }
}
