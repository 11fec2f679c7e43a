//! In-process event bus carrying render and lifecycle notifications.
//!
//! Publishing never waits on subscribers: slow or absent consumers only ever
//! lose events, the core is never blocked.

use futures::{stream::BoxStream, StreamExt};
use timeweave_types::{events::SystemEvent, Result};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace};

pub trait EventBus: Send + Sync {
    fn publish(&self, event: SystemEvent) -> Result<()>;
    fn subscribe(&self) -> BoxStream<'static, SystemEvent>;
}

/// Simple in-process bus backed by a broadcast channel.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<SystemEvent>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventBus for LocalBus {
    fn publish(&self, event: SystemEvent) -> Result<()> {
        trace!("Publishing {:?} event {}", event.kind, event.id);
        if self.tx.send(event).is_err() {
            debug!("No bus subscribers; event dropped");
        }
        Ok(())
    }

    fn subscribe(&self) -> BoxStream<'static, SystemEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }
}

impl<B: EventBus + ?Sized> EventBus for std::sync::Arc<B> {
    fn publish(&self, event: SystemEvent) -> Result<()> {
        (**self).publish(event)
    }

    fn subscribe(&self) -> BoxStream<'static, SystemEvent> {
        (**self).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeweave_types::events::{EventKind, LifecyclePhase};

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = LocalBus::new(8);
        let mut stream = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(SystemEvent::lifecycle(LifecyclePhase::Boot, None))
            .expect("publish");
        let received = stream.next().await.expect("event delivered");
        assert_eq!(received.kind, EventKind::Lifecycle);
    }

    #[test]
    fn publishing_without_subscribers_is_not_an_error() {
        let bus = LocalBus::new(1);
        assert!(bus
            .publish(SystemEvent::lifecycle(LifecyclePhase::Shutdown, None))
            .is_ok());
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_lost_events() {
        let bus = LocalBus::new(2);
        let mut stream = bus.subscribe();
        for _ in 0..5 {
            bus.publish(SystemEvent::lifecycle(LifecyclePhase::SessionStart, None))
                .expect("publish");
        }
        bus.publish(SystemEvent::lifecycle(LifecyclePhase::SessionEnd, None))
            .expect("publish");
        drop(bus);

        let mut last = None;
        while let Some(event) = stream.next().await {
            last = Some(event);
        }
        let last = last.expect("at least one event survives");
        match last.payload {
            timeweave_types::events::EventPayload::Lifecycle(ev) => {
                assert_eq!(ev.phase, LifecyclePhase::SessionEnd)
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
