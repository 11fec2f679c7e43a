use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    board::Board,
    game::{Move, Verdict},
    TimelineId,
};

/// High-level event bus message kinds moving through the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Lifecycle,
    Timeline,
    Board,
    Move,
    Verdict,
}

/// Immutable event envelope for renderers, logging and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Lifecycle(LifecycleEvent),
    Render(RenderEvent),
    Verdict(Verdict),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub phase: LifecyclePhase,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecyclePhase {
    Boot,
    SessionStart,
    SessionLoaded,
    SessionEnd,
    Shutdown,
}

/// Render contract notifications. Emitted only for committed operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderEvent {
    TimelineCreated {
        id: TimelineId,
        parent_id: Option<TimelineId>,
        branch_turn: Option<usize>,
    },
    TimelineDeleted {
        id: TimelineId,
    },
    BoardUpdated {
        timeline: TimelineId,
        board: Board,
    },
    MoveApplied {
        timeline: TimelineId,
        mv: Move,
    },
}

impl RenderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RenderEvent::TimelineCreated { .. } | RenderEvent::TimelineDeleted { .. } => {
                EventKind::Timeline
            }
            RenderEvent::BoardUpdated { .. } => EventKind::Board,
            RenderEvent::MoveApplied { .. } => EventKind::Move,
        }
    }

    pub fn timeline(&self) -> TimelineId {
        match self {
            RenderEvent::TimelineCreated { id, .. } | RenderEvent::TimelineDeleted { id } => *id,
            RenderEvent::BoardUpdated { timeline, .. } | RenderEvent::MoveApplied { timeline, .. } => {
                *timeline
            }
        }
    }
}

impl SystemEvent {
    pub fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn render(event: RenderEvent) -> Self {
        Self::new(event.kind(), EventPayload::Render(event))
    }

    pub fn lifecycle(phase: LifecyclePhase, details: Option<String>) -> Self {
        Self::new(
            EventKind::Lifecycle,
            EventPayload::Lifecycle(LifecycleEvent {
                phase,
                details,
            }),
        )
    }

    pub fn verdict(verdict: Verdict) -> Self {
        Self::new(EventKind::Verdict, EventPayload::Verdict(verdict))
    }
}
