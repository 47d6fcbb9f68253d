use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{config::Config, orchestrator::Orchestrator};
use crate::{
    events::Bus,
    spawn::spawn_signal,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`Orchestrator`].
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive pool and shutdown events through dedicated workers
    /// with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the orchestrator and starts its event listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Arc<Orchestrator> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let token = CancellationToken::new();

        let listener = {
            let mut rx = bus.subscribe();
            let token = token.clone();
            spawn_signal(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        ev = rx.recv() => match ev {
                            Ok(ev) => subs.emit(&ev),
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
                while let Ok(ev) = rx.try_recv() {
                    subs.emit(&ev);
                }
                subs.shutdown().await;
            })
        };

        Arc::new(Orchestrator::new_internal(self.cfg, bus, token, listener))
    }
}
