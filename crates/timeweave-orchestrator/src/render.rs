//! Render contract: what the core tells a view about committed changes.

use timeweave_bus::EventBus;
use timeweave_types::{
    board::Board,
    events::{RenderEvent, SystemEvent},
    game::Move,
    TimelineId,
};
use tracing::warn;

/// Receives notifications for committed state only. Every method defaults to a
/// no-op so views implement just what they draw.
pub trait RenderObserver {
    fn on_timeline_created(
        &mut self,
        _id: TimelineId,
        _parent_id: Option<TimelineId>,
        _branch_turn: Option<usize>,
    ) {
    }

    fn on_timeline_deleted(&mut self, _id: TimelineId) {}

    fn on_board_updated(&mut self, _timeline: TimelineId, _board: &Board) {}

    fn on_move_applied(&mut self, _timeline: TimelineId, _mv: &Move) {}

    /// A timeline created by a failed operation was removed during rollback.
    /// It was never announced through `on_timeline_created`.
    fn on_timeline_discarded(&mut self, _id: TimelineId) {}
}

pub fn dispatch<O: RenderObserver + ?Sized>(observer: &mut O, event: &RenderEvent) {
    match event {
        RenderEvent::TimelineCreated {
            id,
            parent_id,
            branch_turn,
        } => observer.on_timeline_created(*id, *parent_id, *branch_turn),
        RenderEvent::TimelineDeleted { id } => observer.on_timeline_deleted(*id),
        RenderEvent::BoardUpdated { timeline, board } => {
            observer.on_board_updated(*timeline, board)
        }
        RenderEvent::MoveApplied { timeline, mv } => observer.on_move_applied(*timeline, mv),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RenderObserver for NullObserver {}

/// Keeps every notification in order. Handy for replay and assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<RenderEvent>,
    pub discarded: Vec<TimelineId>,
}

impl RecordingObserver {
    pub fn clear(&mut self) {
        self.events.clear();
        self.discarded.clear();
    }
}

impl RenderObserver for RecordingObserver {
    fn on_timeline_created(
        &mut self,
        id: TimelineId,
        parent_id: Option<TimelineId>,
        branch_turn: Option<usize>,
    ) {
        self.events.push(RenderEvent::TimelineCreated {
            id,
            parent_id,
            branch_turn,
        });
    }

    fn on_timeline_deleted(&mut self, id: TimelineId) {
        self.events.push(RenderEvent::TimelineDeleted { id });
    }

    fn on_board_updated(&mut self, timeline: TimelineId, board: &Board) {
        self.events.push(RenderEvent::BoardUpdated {
            timeline,
            board: board.clone(),
        });
    }

    fn on_move_applied(&mut self, timeline: TimelineId, mv: &Move) {
        self.events.push(RenderEvent::MoveApplied {
            timeline,
            mv: mv.clone(),
        });
    }

    fn on_timeline_discarded(&mut self, id: TimelineId) {
        self.discarded.push(id);
    }
}

/// Forwards render notifications onto an [`EventBus`].
pub struct BusObserver<B: EventBus> {
    bus: B,
}

impl<B: EventBus> BusObserver<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn forward(&self, event: RenderEvent) {
        if let Err(err) = self.bus.publish(SystemEvent::render(event)) {
            warn!("Dropping render event: {err}");
        }
    }
}

impl<B: EventBus> RenderObserver for BusObserver<B> {
    fn on_timeline_created(
        &mut self,
        id: TimelineId,
        parent_id: Option<TimelineId>,
        branch_turn: Option<usize>,
    ) {
        self.forward(RenderEvent::TimelineCreated {
            id,
            parent_id,
            branch_turn,
        });
    }

    fn on_timeline_deleted(&mut self, id: TimelineId) {
        self.forward(RenderEvent::TimelineDeleted { id });
    }

    fn on_board_updated(&mut self, timeline: TimelineId, board: &Board) {
        self.forward(RenderEvent::BoardUpdated {
            timeline,
            board: board.clone(),
        });
    }

    fn on_move_applied(&mut self, timeline: TimelineId, mv: &Move) {
        self.forward(RenderEvent::MoveApplied {
            timeline,
            mv: mv.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use timeweave_bus::LocalBus;
    use timeweave_types::events::{EventKind, EventPayload};

    #[test]
    fn dispatch_routes_each_variant() {
        let mut recorder = RecordingObserver::default();
        let events = vec![
            RenderEvent::TimelineCreated {
                id: 1,
                parent_id: Some(0),
                branch_turn: Some(2),
            },
            RenderEvent::BoardUpdated {
                timeline: 1,
                board: Board::standard(),
            },
            RenderEvent::TimelineDeleted { id: 1 },
        ];
        for event in &events {
            dispatch(&mut recorder, event);
        }
        assert_eq!(recorder.events, events);
        assert!(recorder.discarded.is_empty());
    }

    #[tokio::test]
    async fn bus_observer_publishes_render_events() {
        let bus = LocalBus::new(8);
        let mut stream = bus.subscribe();
        let mut observer = BusObserver::new(bus.clone());
        observer.on_timeline_created(3, Some(0), Some(1));
        observer.on_timeline_discarded(4);

        let event = stream.next().await.expect("event");
        assert_eq!(event.kind, EventKind::Timeline);
        match event.payload {
            EventPayload::Render(RenderEvent::TimelineCreated { id, .. }) => assert_eq!(id, 3),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(observer.bus().subscriber_count(), 1);
    }
}
