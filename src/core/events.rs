//! Core events: what changed after a coordinator operation.
//!
//! Presentation layers (list panel, dock, remote bridge) need to refresh
//! after mutations but must not be called back into while the coordinator
//! is mid-operation. Two modes:
//! - subscribe(): callback fires synchronously inside emit()
//! - poll(): events are also queued for batch processing by the caller's loop
//!
//! Callback order is FIFO by subscription.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use log::{trace, warn};

use crate::entities::OverlayId;

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Overlay list or content changed (add, clone, remove, save, import)
    OverlaysChanged,
    VisibilityChanged { id: OverlayId, visible: bool },
    /// New entry document is current
    ArtifactPublished { path: PathBuf },
    OutputDirChanged { path: PathBuf },
}

type Callback = Arc<dyn Fn(&CoreEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Callback>>>,
    queue: Arc<Mutex<Vec<CoreEvent>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len())
            .field("queued", &self.queue_len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&CoreEvent) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(callback));
    }

    /// Invoke callbacks immediately AND queue for deferred processing.
    pub fn emit(&self, event: CoreEvent) {
        trace!("event: {:?}", event);

        // Clone the list so a callback may subscribe without deadlocking
        let cbs: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for cb in &cbs {
            cb(&event);
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(event);
    }

    /// All events emitted since the last poll.
    pub fn poll(&self) -> Vec<CoreEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_calls_subscribers_and_queues() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        bus.subscribe(move |e| {
            if matches!(e, CoreEvent::OverlaysChanged) {
                hits_cb.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.emit(CoreEvent::OverlaysChanged);
        bus.emit(CoreEvent::VisibilityChanged { id: OverlayId::from("lt-a"), visible: true });
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let polled = bus.poll();
        assert_eq!(polled.len(), 2);
        assert_eq!(polled[0], CoreEvent::OverlaysChanged);
        assert!(bus.poll().is_empty());
    }

    #[test]
    fn queue_evicts_oldest_half_when_full() {
        let bus = EventBus::new();
        for _ in 0..MAX_QUEUE_SIZE {
            bus.emit(CoreEvent::OverlaysChanged);
        }
        bus.emit(CoreEvent::OutputDirChanged { path: PathBuf::from("/x") });
        assert_eq!(bus.queue_len(), MAX_QUEUE_SIZE / 2 + 1);
        let last = bus.poll().pop();
        assert_eq!(last, Some(CoreEvent::OutputDirChanged { path: PathBuf::from("/x") }));
    }

    #[test]
    fn clones_share_queue() {
        let bus = EventBus::new();
        let handle = bus.clone();
        handle.emit(CoreEvent::OverlaysChanged);
        assert_eq!(bus.queue_len(), 1);
    }
}
