// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming over tokio broadcast channels. Hosts (or the
// in-memory world) publish change notifications; the event dispatcher
// consumes them, and the reconciler publishes sync completions for
// downstream subscribers such as sheet re-renders.
//
// Change notifications are also carried on a channel of their own, so a
// burst of sync completions never pushes pending changes out of a
// change-only subscriber's buffer.

use crate::domain::entity::OwnerId;
use crate::domain::events::{ChangeEvent, SyncEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Change(ChangeEvent),
    Sync(SyncEvent),
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
    changes: Arc<broadcast::Sender<ChangeEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (changes, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
            changes: Arc::new(changes),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish a change notification
    pub fn publish_change_event(&self, event: ChangeEvent) {
        // Err only means nobody subscribed to changes alone
        let _ = self.changes.send(event.clone());
        self.publish(DomainEvent::Change(event));
    }

    /// Publish a sync completion
    pub fn publish_sync_event(&self, event: SyncEvent) {
        self.publish(DomainEvent::Sync(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all domain events
    pub fn subscribe(&self) -> EventReceiver {
        let receiver = self.sender.subscribe();
        EventReceiver { receiver }
    }

    /// Subscribe to change notifications only
    pub fn subscribe_changes(&self) -> ChangeEventReceiver {
        let receiver = self.changes.subscribe();
        ChangeEventReceiver { receiver }
    }

    /// Subscribe to sync completions of a single owner
    pub fn subscribe_sync(&self, owner_id: OwnerId) -> SyncEventReceiver {
        let receiver = self.sender.subscribe();
        SyncEventReceiver { receiver, owner_id }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count() + self.changes.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

fn map_try_recv_error(e: broadcast::error::TryRecvError) -> EventBusError {
    match e {
        broadcast::error::TryRecvError::Empty => EventBusError::Empty,
        broadcast::error::TryRecvError::Closed => EventBusError::Closed,
        broadcast::error::TryRecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(map_try_recv_error)
    }
}

/// Receiver for change notifications only
pub struct ChangeEventReceiver {
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeEventReceiver {
    pub async fn recv(&mut self) -> Result<ChangeEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<ChangeEvent, EventBusError> {
        self.receiver.try_recv().map_err(map_try_recv_error)
    }
}

/// Receiver for one owner's sync completions (filtered)
pub struct SyncEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    owner_id: OwnerId,
}

impl SyncEventReceiver {
    /// Receive the next sync event for the subscribed owner
    pub async fn recv(&mut self) -> Result<SyncEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;

            if let DomainEvent::Sync(sync_event) = event {
                if self.matches_owner(&sync_event) {
                    return Ok(sync_event);
                }
            }
        }
    }

    fn matches_owner(&self, event: &SyncEvent) -> bool {
        match event {
            SyncEvent::OwnerSynced { owner_id, .. } => owner_id == &self.owner_id,
            SyncEvent::OwnerSyncFailed { owner_id, .. } => owner_id == &self.owner_id,
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
