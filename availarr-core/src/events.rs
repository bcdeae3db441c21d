//! Sinks for "became available" events.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use availarr_model::MediaAvailableEvent;
use tokio::sync::{Mutex, broadcast};
use tracing::info;

use crate::error::Result;

#[async_trait]
pub trait AvailabilityEventSink: Send + Sync + fmt::Debug {
    async fn publish(&self, event: MediaAvailableEvent) -> Result<()>;
}

/// Fans events out to in-process subscribers (the notification service).
/// Events published with no subscriber attached are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<MediaAvailableEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MediaAvailableEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl AvailabilityEventSink for BroadcastEventSink {
    async fn publish(&self, event: MediaAvailableEvent) -> Result<()> {
        // `send` only fails when nobody listens.
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// Logs each event at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl AvailabilityEventSink for TracingEventSink {
    async fn publish(&self, event: MediaAvailableEvent) -> Result<()> {
        info!(
            target: "availarr::events",
            request_id = %event.request_id,
            canonical_id = %event.canonical_id,
            kind = %event.kind,
            tier = %event.tier,
            seasons = ?event.seasons,
            "media available"
        );
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<Vec<MediaAvailableEvent>>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<MediaAvailableEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AvailabilityEventSink for InMemoryEventSink {
    async fn publish(&self, event: MediaAvailableEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Publishes to every inner sink; the first error is returned after all
/// sinks were tried.
#[derive(Debug, Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn AvailabilityEventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<Arc<dyn AvailabilityEventSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AvailabilityEventSink for FanoutEventSink {
    async fn publish(&self, event: MediaAvailableEvent) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.publish(event.clone()).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
