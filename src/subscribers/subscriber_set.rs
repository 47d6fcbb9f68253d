//! # Non-blocking event fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`] which distributes events to multiple subscribers
//! concurrently without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     │    (bounded)
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//!          (bounded)
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N while B processes N+5
//! - **Overflow**: event dropped for that subscriber only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Per-subscriber FIFO**: each subscriber sees events in order
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::channel::{Sender, bounded};
use crate::error::{TaskError, TrySendError};
use crate::events::{Bus, Event, EventKind};
use crate::spawn::{GroupHandle, spawn_group};
use crate::subscribers::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: GroupHandle,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut queues = Vec::with_capacity(subs.len());

        for sub in &subs {
            let (tx, rx) = bounded::<Arc<Event>>(sub.queue_capacity().max(1));
            channels.push(SubscriberChannel {
                name: sub.name(),
                sender: tx,
            });
            queues.push(rx);
        }

        let workers = {
            let bus = bus.clone();
            spawn_group(subs.len(), move |i| {
                let sub = Arc::clone(&subs[i]);
                let rx = queues[i].clone();
                let bus = bus.clone();
                async move {
                    while let Some(ev) = rx.recv().await {
                        let fut = sub.on_event(ev.as_ref());
                        if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
                            let info = match TaskError::from_panic(panic) {
                                TaskError::Panicked { info } => info,
                                other => other.to_string(),
                            };
                            bus.publish(Event::subscriber_panicked(sub.name(), info));
                        }
                    }
                    Ok(())
                }
            })
        };

        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emits an event to all subscribers (clones the event).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// Overflow events that overflow themselves are not re-published.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// Closes every queue; workers drain what is buffered and exit.
    pub async fn shutdown(self) {
        for channel in &self.channels {
            channel.sender.close();
        }
        self.workers.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.kinds.lock().unwrap().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploder;

    #[async_trait]
    impl Subscribe for Exploder {
        async fn on_event(&self, _ev: &Event) {
            panic!("subscriber bug");
        }
        fn name(&self) -> &'static str {
            "exploder"
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_isolates_panics() {
        let bus = Bus::new(16);
        let mut bus_rx = bus.subscribe();
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone(), Arc::new(Exploder)], bus);
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::UnitStarting));
        set.emit(&Event::new(EventKind::UnitStopped));
        set.shutdown().await;

        assert_eq!(
            *rec.kinds.lock().unwrap(),
            vec![EventKind::UnitStarting, EventKind::UnitStopped]
        );
        let ev = bus_rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.name.as_deref(), Some("exploder"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber bug"));
    }
}
