//! Serialized form of a whole multi-timeline session.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    fen,
    game::{Move, Snapshot},
    Result, TimelineId, TimeweaveError,
};

/// Version 1 saves stored bare-board snapshots and no initial position.
pub const SAVE_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRecord {
    pub id: TimelineId,
    pub parent_id: Option<TimelineId>,
    pub branch_turn: Option<usize>,
    #[serde(default)]
    pub display_offset: f32,
    #[serde(default = "standard_fen")]
    pub initial_fen: String,
    /// Current positional state.
    pub fen: String,
    pub moves: Vec<Move>,
    pub snapshots: Vec<Snapshot>,
}

fn standard_fen() -> String {
    fen::STARTING_POSITION.into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    /// Registry id counter; persisted so reloaded sessions never reuse ids.
    pub next_id: TimelineId,
    pub timelines: Vec<TimelineRecord>,
}

impl SavedSession {
    pub fn new(next_id: TimelineId, timelines: Vec<TimelineRecord>) -> Self {
        Self {
            version: SAVE_FORMAT_VERSION,
            saved_at: Utc::now(),
            next_id,
            timelines,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| TimeweaveError::Persistence(format!("failed to encode session: {err}")))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let session: SavedSession = serde_json::from_str(text)
            .map_err(|err| TimeweaveError::Persistence(format!("failed to decode session: {err}")))?;
        session.validate()?;
        Ok(session)
    }

    pub fn legacy_snapshot_count(&self) -> usize {
        self.timelines
            .iter()
            .flat_map(|t| t.snapshots.iter())
            .filter(|s| s.is_legacy())
            .count()
    }

    /// Structural checks that do not need the rule engine.
    pub fn validate(&self) -> Result<()> {
        if self.version > SAVE_FORMAT_VERSION {
            return Err(TimeweaveError::Persistence(format!(
                "save format {} is newer than supported {SAVE_FORMAT_VERSION}",
                self.version
            )));
        }

        let mut ids = BTreeSet::new();
        for record in &self.timelines {
            if !ids.insert(record.id) {
                return Err(TimeweaveError::Persistence(format!(
                    "timeline {} appears twice",
                    record.id
                )));
            }
            if record.id >= self.next_id {
                return Err(TimeweaveError::Persistence(format!(
                    "timeline {} is not below next_id {}",
                    record.id, self.next_id
                )));
            }
            if record.moves.len() != record.snapshots.len() {
                return Err(TimeweaveError::Persistence(format!(
                    "timeline {} has {} moves but {} snapshots",
                    record.id,
                    record.moves.len(),
                    record.snapshots.len()
                )));
            }
        }

        for record in &self.timelines {
            if let Some(parent) = record.parent_id {
                if !ids.contains(&parent) {
                    return Err(TimeweaveError::Persistence(format!(
                        "timeline {} references missing parent {parent}",
                        record.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameState;

    fn root_record() -> TimelineRecord {
        TimelineRecord {
            id: 0,
            parent_id: None,
            branch_turn: None,
            display_offset: 0.0,
            initial_fen: fen::STARTING_POSITION.into(),
            fen: fen::STARTING_POSITION.into(),
            moves: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    #[test]
    fn json_round_trip_keeps_records() {
        let session = SavedSession::new(1, vec![root_record()]);
        let json = session.to_json().expect("encode");
        let back = SavedSession::from_json(&json).expect("decode");
        assert_eq!(back, session);
    }

    #[test]
    fn validation_catches_broken_saves() {
        let mut session = SavedSession::new(1, vec![root_record()]);
        session.next_id = 0;
        assert!(session.validate().is_err());

        let mut session = SavedSession::new(2, vec![root_record(), root_record()]);
        session.timelines[1].id = 1;
        session.timelines[1].parent_id = Some(7);
        assert!(session.validate().is_err());

        let mut session = SavedSession::new(1, vec![root_record()]);
        session.timelines[0]
            .snapshots
            .push(Snapshot::Full(GameState::initial()));
        assert!(session.validate().is_err());
    }

    #[test]
    fn version_one_records_default_missing_fields() {
        let json = r#"{
            "version": 1,
            "saved_at": "2024-01-01T00:00:00Z",
            "next_id": 1,
            "timelines": [{
                "id": 0,
                "parent_id": null,
                "branch_turn": null,
                "fen": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                "moves": [],
                "snapshots": []
            }]
        }"#;
        let session = SavedSession::from_json(json).expect("legacy save decodes");
        assert_eq!(session.timelines[0].initial_fen, fen::STARTING_POSITION);
        assert_eq!(session.timelines[0].display_offset, 0.0);
        assert_eq!(session.legacy_snapshot_count(), 0);
    }
}
