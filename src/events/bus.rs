//! Synchronous in-process event bus.
//!
//! Subscribers are registered per [`EventKind`] while building the bus and the registry
//! cannot change afterwards. `publish` awaits every subscriber for the event's kind in
//! registration order. A failing subscriber is logged and counted; it never stops the
//! subscribers after it and never fails the publisher.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error};

use super::types::{DomainEvent, EventKind};
use crate::observability::workflow_metrics;

pub const DEFAULT_TAP_CAPACITY: usize = 256;

#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs when the subscriber fails
    fn name(&self) -> &str;

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Adapts a plain function into a subscriber
pub struct FnSubscriber<F> {
    name: String,
    handler: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F> EventSubscriber for FnSubscriber<F>
where
    F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        (self.handler)(event)
    }
}

/// Outcome of delivering one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct EventBusBuilder {
    subscribers: HashMap<EventKind, Vec<Arc<dyn EventSubscriber>>>,
    tap_capacity: usize,
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self {
            subscribers: HashMap::new(),
            tap_capacity: DEFAULT_TAP_CAPACITY,
        }
    }
}

impl EventBusBuilder {
    pub fn subscribe(mut self, kind: EventKind, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscribers.entry(kind).or_default().push(subscriber);
        self
    }

    pub fn tap_capacity(mut self, capacity: usize) -> Self {
        self.tap_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> EventBus {
        let (tap, _) = broadcast::channel(self.tap_capacity);
        EventBus {
            subscribers: self.subscribers,
            tap,
        }
    }
}

pub struct EventBus {
    subscribers: HashMap<EventKind, Vec<Arc<dyn EventSubscriber>>>,
    tap: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// A bus with no subscribers
    pub fn empty() -> Self {
        Self::builder().build()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }

    /// Receive a copy of every published event. Slow receivers lag and lose events
    /// without affecting publishers.
    pub fn tap(&self) -> broadcast::Receiver<DomainEvent> {
        self.tap.subscribe()
    }

    pub async fn publish(&self, event: DomainEvent) -> DispatchReport {
        let kind = event.kind();
        let mut report = DispatchReport::default();
        workflow_metrics().record_event();

        for subscriber in self.subscribers.get(&kind).into_iter().flatten() {
            match subscriber.handle(&event).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    workflow_metrics().record_listener_failure();
                    error!(
                        event.kind = %kind,
                        mission.id = %event.mission_id(),
                        payload.id = %event.payload_id(),
                        subscriber = %subscriber.name(),
                        error = %err,
                        "Event subscriber failed"
                    );
                }
            }
        }

        // No tap receivers is the normal case
        let _ = self.tap.send(event);

        debug!(
            event.kind = %kind,
            delivered = report.delivered,
            failed = report.failed,
            "Event dispatched"
        );
        report
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MissionStatus;
    use crate::events::types::MissionStatusChanged;
    use std::sync::Mutex;

    fn status_event() -> DomainEvent {
        MissionStatusChanged {
            mission_id: "m-1".to_string(),
            previous_status: MissionStatus::Pending,
            new_status: MissionStatus::InProgress,
            acting_user_id: 7,
        }
        .into()
    }

    fn recorder(
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn EventSubscriber> {
        Arc::new(FnSubscriber::new(name, move |_event: &DomainEvent| {
            log.lock().unwrap().push(name);
            Ok(())
        }))
    }

    #[tokio::test]
    async fn test_subscribers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = EventBus::builder()
            .subscribe(EventKind::MissionStatusChanged, recorder("first", log.clone()))
            .subscribe(EventKind::MissionStatusChanged, recorder("second", log.clone()))
            .subscribe(EventKind::MissionAssigned, recorder("other", log.clone()))
            .build();

        let report = bus.publish(status_event()).await;

        assert_eq!(report, DispatchReport { delivered: 2, failed: 0 });
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_stop_later_ones() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: Arc<dyn EventSubscriber> = Arc::new(FnSubscriber::new(
            "failing",
            |_event: &DomainEvent| Err(anyhow::anyhow!("notification store offline")),
        ));
        let bus = EventBus::builder()
            .subscribe(EventKind::MissionStatusChanged, failing)
            .subscribe(EventKind::MissionStatusChanged, recorder("after", log.clone()))
            .build();

        let report = bus.publish(status_event()).await;

        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_tap_receives_published_events() {
        let bus = EventBus::empty();
        let mut tap = bus.tap();

        let report = bus.publish(status_event()).await;

        assert_eq!(report, DispatchReport::default());
        assert_eq!(tap.recv().await.unwrap(), status_event());
        assert_eq!(bus.subscriber_count(EventKind::MissionStatusChanged), 0);
    }
}
