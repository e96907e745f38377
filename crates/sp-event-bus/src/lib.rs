//! Event bus with typed pub/sub for ShutterPilot
//!
//! The EventBus is the message broker between the entity state store and the
//! profile controllers. Besides raw per-type subscriptions it offers
//! [`EventBus::track_state_change`], which runs a callback for every state
//! change of a chosen set of entities and hands back a [`ListenerHandle`]
//! that unsubscribes when removed or dropped.

use dashmap::DashMap;
use sp_core::events::StateChangedData;
use sp_core::{EntityId, Event, EventData, EventType};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A unique identifier for an event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The event bus for publishing and subscribing to events
pub struct EventBus {
    /// Map of event types to their broadcast senders
    listeners: DashMap<EventType, broadcast::Sender<Event<serde_json::Value>>>,
    /// Counter for generating unique listener IDs
    next_listener_id: AtomicU64,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
            capacity,
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe(
        &self,
        event_type: impl Into<EventType>,
    ) -> broadcast::Receiver<Event<serde_json::Value>> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        self.listeners
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to a typed event, receiving parsed payloads
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Fire an event to all subscribers of its type
    pub fn fire(&self, event: Event<serde_json::Value>) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // A send error only means nobody is listening right now
            let _ = sender.send(event);
        }
    }

    /// Fire a typed event
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T) {
        let event = Event::typed(data);
        let payload = match serde_json::to_value(&event.data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(event_type = %event.event_type, error = %e, "Dropping unserializable event");
                return;
            }
        };
        self.fire(Event {
            event_type: event.event_type,
            data: payload,
            time_fired: event.time_fired,
        });
    }

    /// Run `callback` for every state change of any of `entity_ids`
    ///
    /// The subscription is taken before this method returns, so a state
    /// written right afterwards is never missed. Must be called from within a
    /// Tokio runtime.
    pub fn track_state_change<F>(&self, entity_ids: &[EntityId], callback: F) -> ListenerHandle
    where
        F: Fn(Event<StateChangedData>) + Send + Sync + 'static,
    {
        let id = self.next_listener_id();
        let watched: HashSet<EntityId> = entity_ids.iter().cloned().collect();
        let mut rx = self.subscribe_typed::<StateChangedData>();

        debug!(listener = id.0, entities = watched.len(), "Tracking state changes");

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if watched.contains(&event.data.entity_id) => callback(event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(listener = id.0, skipped = n, "State listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        ListenerHandle::new(id, task)
    }

    /// Generate a new unique listener ID
    pub fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for typed events
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event<serde_json::Value>>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<Event<serde_json::Value>>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next event whose payload parses as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(event.data) {
                return Ok(Event {
                    event_type: event.event_type,
                    data,
                    time_fired: event.time_fired,
                });
            }
        }
    }
}

/// Handle to a running listener; removing or dropping it unsubscribes
#[derive(Debug)]
pub struct ListenerHandle {
    id: ListenerId,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Wrap a spawned listener task
    pub fn new(id: ListenerId, task: JoinHandle<()>) -> Self {
        Self {
            id,
            task: Some(task),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether the listener task is still running
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the listener
    pub fn remove(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            trace!(listener = self.id.0, "Removing listener");
            task.abort();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;
