//! Capture, commit and rollback of multi-timeline mutations.
//!
//! A transaction records the pre-image of every existing timeline it is about
//! to touch and the id of every timeline it creates. Rollback deletes the new
//! timelines and writes the pre-images back; commit just closes the
//! transaction.

use std::collections::BTreeMap;

use timeweave_types::{
    game::{GameState, Move, Snapshot},
    Result, TimelineId, TimeweaveError,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{registry::TimelineRegistry, timeline::Timeline};

/// Pre-image of one timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedTimeline {
    pub label: String,
    pub fen: String,
    pub moves: Vec<Move>,
    pub snapshots: Vec<Snapshot>,
}

impl CapturedTimeline {
    fn of(timeline: &Timeline, label: &str) -> Self {
        Self {
            label: label.to_string(),
            fen: timeline.positional_state(),
            moves: timeline.moves().to_vec(),
            snapshots: timeline.snapshots().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    Open,
    Committed,
    RolledBack,
}

/// What a rollback did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub deleted: Vec<TimelineId>,
    pub restored: Vec<TimelineId>,
    /// Captured timelines no longer in the registry.
    pub skipped: Vec<TimelineId>,
    /// Timelines whose positional state could not be restored.
    pub failed: Vec<TimelineId>,
    /// Set when the call was a repeat of an earlier rollback.
    pub repeated: bool,
}

impl RollbackReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    captured: BTreeMap<TimelineId, CapturedTimeline>,
    created: Vec<TimelineId>,
    phase: TransactionPhase,
}

impl Transaction {
    pub fn begin() -> Self {
        let id = Uuid::new_v4();
        debug!("Transaction {id} opened");
        Self {
            id,
            captured: BTreeMap::new(),
            created: Vec::new(),
            phase: TransactionPhase::Open,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> TransactionPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase == TransactionPhase::Open
    }

    pub fn captured(&self, id: TimelineId) -> Option<&CapturedTimeline> {
        self.captured.get(&id)
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        match self.phase {
            TransactionPhase::Open => Ok(()),
            phase => Err(TimeweaveError::TransactionState(format!(
                "cannot {action} transaction {} in phase {phase:?}",
                self.id
            ))),
        }
    }

    /// Records the pre-image of `timeline`. Only the first capture of a given
    /// id counts; later calls keep the original image.
    pub fn capture_timeline(&mut self, timeline: &Timeline, label: &str) -> Result<()> {
        self.ensure_open("capture in")?;
        if self.captured.contains_key(&timeline.id()) {
            debug!(
                "Transaction {} already holds timeline {}; ignoring '{label}'",
                self.id,
                timeline.id()
            );
            return Ok(());
        }
        debug!(
            "Transaction {} captured timeline {} ({label})",
            self.id,
            timeline.id()
        );
        self.captured
            .insert(timeline.id(), CapturedTimeline::of(timeline, label));
        Ok(())
    }

    /// Marks `id` as created by this transaction, to be deleted on rollback.
    pub fn capture_new_timeline(&mut self, id: TimelineId) -> Result<()> {
        self.ensure_open("record a timeline in")?;
        if !self.created.contains(&id) {
            debug!("Transaction {} created timeline {id}", self.id);
            self.created.push(id);
        }
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open("commit")?;
        self.phase = TransactionPhase::Committed;
        info!(
            "Transaction {} committed ({} touched, {} created)",
            self.id,
            self.captured.len(),
            self.created.len()
        );
        Ok(())
    }

    /// Undoes everything captured so far.
    ///
    /// New timelines go first: `on_discard` is called for each one still
    /// registered, just before it is deleted. Captured timelines are then restored
    /// one by one; a timeline that cannot be restored is logged and reported
    /// but does not stop the others. Rolling back twice is a no-op; rolling
    /// back a committed transaction is an error.
    pub fn rollback<F>(
        &mut self,
        registry: &mut TimelineRegistry,
        mut on_discard: F,
    ) -> Result<RollbackReport>
    where
        F: FnMut(TimelineId),
    {
        match self.phase {
            TransactionPhase::Committed => {
                return Err(TimeweaveError::TransactionState(format!(
                    "transaction {} is already committed",
                    self.id
                )))
            }
            TransactionPhase::RolledBack => {
                debug!("Transaction {} already rolled back", self.id);
                return Ok(RollbackReport {
                    repeated: true,
                    ..RollbackReport::default()
                });
            }
            TransactionPhase::Open => {}
        }

        let mut report = RollbackReport::default();
        for &id in self.created.iter().rev() {
            if !registry.contains(id) {
                continue;
            }
            on_discard(id);
            registry.delete(id);
            report.deleted.push(id);
        }

        for (&id, captured) in &self.captured {
            let Some(timeline) = registry.get_mut(id) else {
                warn!("Timeline {id} vanished before rollback; skipping");
                report.skipped.push(id);
                continue;
            };
            match GameState::from_fen(&captured.fen) {
                Ok(state) => {
                    timeline.restore(state);
                    timeline.restore_history(captured.moves.clone(), captured.snapshots.clone());
                    report.restored.push(id);
                }
                Err(err) => {
                    error!(
                        "Could not restore timeline {id} ({}): {err}",
                        captured.label
                    );
                    timeline.restore_history(captured.moves.clone(), captured.snapshots.clone());
                    report.failed.push(id);
                }
            }
        }

        self.phase = TransactionPhase::RolledBack;
        if report.is_complete() {
            warn!(
                "Transaction {} rolled back ({} restored, {} discarded)",
                self.id,
                report.restored.len(),
                report.deleted.len()
            );
        } else {
            error!(
                "Transaction {} rolled back partially; failed timelines {:?}",
                self.id, report.failed
            );
        }
        Ok(report)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.phase == TransactionPhase::Open {
            warn!(
                "Transaction {} dropped while open; {} captures discarded",
                self.id,
                self.captured.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeweave_engine::find_legal_move;
    use timeweave_types::board::{PieceKind, Square};

    fn play(timeline: &mut Timeline, from: &str, to: &str) {
        let mv = find_legal_move(
            timeline.state(),
            Square::parse(from).unwrap(),
            Square::parse(to).unwrap(),
            None,
            PieceKind::Queen,
        )
        .unwrap();
        timeline.apply_move(mv).unwrap();
    }

    fn registry_with_root() -> (TimelineRegistry, TimelineId) {
        let mut registry = TimelineRegistry::new();
        let id = registry.create(None, None, GameState::initial()).unwrap().id();
        (registry, id)
    }

    #[test]
    fn first_capture_wins() {
        let (mut registry, root) = registry_with_root();
        let mut txn = Transaction::begin();
        txn.capture_timeline(registry.get(root).unwrap(), "before").unwrap();
        play(registry.get_mut(root).unwrap(), "e2", "e4");
        txn.capture_timeline(registry.get(root).unwrap(), "after").unwrap();

        let captured = txn.captured(root).unwrap();
        assert_eq!(captured.label, "before");
        assert!(captured.moves.is_empty());

        txn.rollback(&mut registry, |_| {}).unwrap();
        assert_eq!(registry.get(root).unwrap().state(), &GameState::initial());
        assert_eq!(registry.get(root).unwrap().ply(), 0);
    }

    #[test]
    fn commit_and_rollback_are_exclusive() {
        let (mut registry, _) = registry_with_root();

        let mut committed = Transaction::begin();
        committed.commit().unwrap();
        assert!(matches!(
            committed.rollback(&mut registry, |_| {}),
            Err(TimeweaveError::TransactionState(_))
        ));
        assert!(committed.commit().is_err());

        let mut rolled = Transaction::begin();
        rolled.rollback(&mut registry, |_| {}).unwrap();
        assert!(matches!(
            rolled.commit(),
            Err(TimeweaveError::TransactionState(_))
        ));
        assert_eq!(rolled.phase(), TransactionPhase::RolledBack);
    }

    #[test]
    fn repeated_rollback_changes_nothing() {
        let (mut registry, root) = registry_with_root();
        let mut txn = Transaction::begin();
        let branch = registry
            .create(Some(root), Some(0), GameState::initial())
            .unwrap()
            .id();
        txn.capture_new_timeline(branch).unwrap();

        let mut discarded = Vec::new();
        let first = txn.rollback(&mut registry, |id| discarded.push(id)).unwrap();
        assert_eq!(first.deleted, vec![branch]);

        let second = txn.rollback(&mut registry, |id| discarded.push(id)).unwrap();
        assert!(second.repeated);
        assert!(second.deleted.is_empty());
        assert_eq!(discarded, vec![branch]);
        assert!(!registry.contains(branch));
    }

    #[test]
    fn captures_close_after_finalization() {
        let (registry, root) = registry_with_root();
        let mut txn = Transaction::begin();
        txn.commit().unwrap();
        assert!(txn.capture_timeline(registry.get(root).unwrap(), "late").is_err());
        assert!(txn.capture_new_timeline(9).is_err());
    }

    #[test]
    fn corrupt_capture_does_not_block_other_restores() {
        let (mut registry, root) = registry_with_root();
        let other = registry
            .create(Some(root), Some(0), GameState::initial())
            .unwrap()
            .id();

        let mut txn = Transaction::begin();
        txn.capture_timeline(registry.get(root).unwrap(), "root").unwrap();
        txn.capture_timeline(registry.get(other).unwrap(), "other").unwrap();
        txn.captured.get_mut(&root).unwrap().fen = "not a position".into();

        play(registry.get_mut(root).unwrap(), "e2", "e4");
        play(registry.get_mut(other).unwrap(), "d2", "d4");

        let report = txn.rollback(&mut registry, |_| {}).unwrap();
        assert_eq!(report.failed, vec![root]);
        assert_eq!(report.restored, vec![other]);
        assert!(!report.is_complete());
        assert_eq!(registry.get(other).unwrap().state(), &GameState::initial());
        assert_eq!(registry.get(other).unwrap().ply(), 0);
        assert_eq!(registry.get(root).unwrap().ply(), 0);
    }

    #[test]
    fn vanished_timeline_is_skipped() {
        let (mut registry, root) = registry_with_root();
        let mut txn = Transaction::begin();
        txn.capture_timeline(registry.get(root).unwrap(), "root").unwrap();
        registry.delete(root);
        let report = txn.rollback(&mut registry, |_| {}).unwrap();
        assert_eq!(report.skipped, vec![root]);
        assert!(report.is_complete());
    }
}
