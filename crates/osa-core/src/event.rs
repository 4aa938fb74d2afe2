use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, Notify};

use crate::types::AgentEvent;

/// Process-wide publish/subscribe facility with topic-free fan-out: every
/// event carries its own discriminant (`event_name()`) and optional
/// `session_id()`, so subscribers filter on those rather than a separate
/// topic string.
///
/// `publish` is non-blocking and never fails from the caller's perspective.
/// Each filtered subscriber gets its own bounded queue fed by a background
/// forwarding task; a slow subscriber drops its own oldest events instead of
/// blocking the publisher or other subscribers.
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: AgentEvent) {
        let _ = self.tx.send(event);
    }

    /// Raw unfiltered broadcast receiver — delivery order per-subscriber
    /// matches publish order, but overflow here is whatever `tokio::sync::
    /// broadcast` itself does (lagged receivers skip ahead). Prefer
    /// `subscribe_filtered` for session-scoped or type-scoped consumers,
    /// which get their own drop-oldest queue instead.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    /// Subscribe with a filter and a bounded per-subscriber queue. Returns a
    /// handle; drop it (or call `unsubscribe`) to stop the forwarding task.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> SubscriptionHandle {
        self.subscribe_filtered_with_capacity(filter, 256)
    }

    pub fn subscribe_filtered_with_capacity(
        &self,
        filter: EventFilter,
        capacity: usize,
    ) -> SubscriptionHandle {
        let queue = Arc::new(BoundedDropOldest::new(capacity));
        let mut rx = self.tx.subscribe();
        let queue_task = queue.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if filter.matches(&event) {
                            queue_task.push(event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        SubscriptionHandle {
            queue,
            task: Some(task),
        }
    }

    /// Remove a subscription by aborting its forwarding task.
    pub fn unsubscribe(&self, mut handle: SubscriptionHandle) {
        if let Some(task) = handle.task.take() {
            task.abort();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Filter criteria for scoped event subscriptions.
///
/// All fields are optional; an event must match **all** specified criteria.
/// Unset fields are treated as "match anything".
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only events with this session_id (extracted from the event variant).
    pub session_id: Option<String>,
    /// Only events of these types (matched by `AgentEvent::event_name()`).
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a filter that matches a specific session.
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    /// Create a filter that matches specific event types.
    pub fn for_types(types: Vec<String>) -> Self {
        Self {
            event_types: Some(types),
            ..Default::default()
        }
    }

    /// Add a session_id constraint.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Check whether an event matches this filter.
    pub fn matches(&self, event: &AgentEvent) -> bool {
        if let Some(ref sid) = self.session_id {
            match event.session_id() {
                Some(event_sid) if &event_sid.0 != sid => return false,
                Some(_) => {}
                // Process-wide events (no session_id) pass a session filter;
                // they aren't tied to any one session to exclude.
                None => {}
            }
        }

        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_name()) {
                return false;
            }
        }

        true
    }
}

/// A bounded queue that drops the oldest entry on overflow, recording a
/// counter, per the Event Bus's backpressure contract.
struct BoundedDropOldest {
    inner: Mutex<VecDeque<AgentEvent>>,
    capacity: usize,
    dropped: AtomicU64,
    notify: Notify,
}

impl BoundedDropOldest {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    fn push(&self, event: AgentEvent) {
        let mut guard = self.inner.lock().expect("event queue mutex poisoned");
        if guard.len() >= self.capacity {
            guard.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        guard.push_back(event);
        drop(guard);
        self.notify.notify_one();
    }

    async fn recv(&self) -> AgentEvent {
        loop {
            {
                let mut guard = self.inner.lock().expect("event queue mutex poisoned");
                if let Some(event) = guard.pop_front() {
                    return event;
                }
            }
            self.notify.notified().await;
        }
    }

    fn try_recv(&self) -> Option<AgentEvent> {
        self.inner
            .lock()
            .expect("event queue mutex poisoned")
            .pop_front()
    }

    fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A live subscription created by `subscribe_filtered`. Dropping it stops
/// the forwarding task.
pub struct SubscriptionHandle {
    queue: Arc<BoundedDropOldest>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Receive the next matching event, waiting until one arrives.
    pub async fn recv(&self) -> AgentEvent {
        self.queue.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Option<AgentEvent> {
        self.queue.try_recv()
    }

    /// Number of events dropped from this subscriber's queue due to
    /// overflow.
    pub fn dropped_count(&self) -> u64 {
        self.queue.dropped_count()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Backwards-compatible alias used by call sites grounded in the original
/// filtered-receiver shape.
pub type FilteredReceiver = SubscriptionHandle;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;

    #[tokio::test]
    async fn unfiltered_subscribe_delivers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(AgentEvent::RunStarted {
            session_id: SessionId::from_str("s1"),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, AgentEvent::RunStarted { .. }));
    }

    #[tokio::test]
    async fn filter_by_session() {
        let bus = EventBus::new(16);
        let handle = bus.subscribe_filtered(EventFilter::for_session("s1"));
        // give the forwarding task a chance to subscribe before publishing
        tokio::task::yield_now().await;

        bus.publish(AgentEvent::RunStarted {
            session_id: SessionId::from_str("s2"),
        });
        bus.publish(AgentEvent::RunStarted {
            session_id: SessionId::from_str("s1"),
        });

        let event = handle.recv().await;
        match event {
            AgentEvent::RunStarted { session_id } => assert_eq!(session_id.0, "s1"),
            _ => panic!("wrong event"),
        }
    }

    #[tokio::test]
    async fn filter_by_event_type() {
        let bus = EventBus::new(16);
        let handle =
            bus.subscribe_filtered(EventFilter::for_types(vec!["turn_complete".to_string()]));
        tokio::task::yield_now().await;

        let sid = SessionId::from_str("s1");
        bus.publish(AgentEvent::RunStarted {
            session_id: sid.clone(),
        });
        bus.publish(AgentEvent::TurnComplete {
            session_id: sid.clone(),
            turn: 0,
        });
        bus.publish(AgentEvent::TextDelta {
            session_id: sid.clone(),
            delta: "hello".to_string(),
        });
        bus.publish(AgentEvent::TurnComplete {
            session_id: sid,
            turn: 1,
        });

        let e1 = handle.recv().await;
        assert!(matches!(e1, AgentEvent::TurnComplete { turn: 0, .. }));
        let e2 = handle.recv().await;
        assert!(matches!(e2, AgentEvent::TurnComplete { turn: 1, .. }));
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let bus = EventBus::new(64);
        let handle = bus.subscribe_filtered_with_capacity(EventFilter::default(), 2);
        tokio::task::yield_now().await;

        for i in 0..5u64 {
            bus.publish(AgentEvent::UsageUpdate {
                session_id: SessionId::from_str("s1"),
                input_tokens: i,
                output_tokens: 0,
            });
        }
        // allow the forwarding task to drain the broadcast channel
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(handle.dropped_count() >= 1);
    }

    #[tokio::test]
    async fn process_wide_events_pass_session_filter() {
        let filter = EventFilter::for_session("s1");
        assert!(filter.matches(&AgentEvent::CronFired {
            job_id: "j1".into(),
            prompt: "hi".into(),
        }));
        assert!(!filter.matches(&AgentEvent::RunStarted {
            session_id: SessionId::from_str("s2"),
        }));
    }
}
