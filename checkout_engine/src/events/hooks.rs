//! Wiring between the status hooks a caller registers and the producers the state machine publishes to.
//!
//! Every registered hook gets its own [`EventHandler`] with its own channel, so one slow subscriber cannot starve
//! another. The state machine holds one producer per hook and publishes each transition to all of them.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{EventHandler, EventProducer, Handler, InvoiceStatusEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub status_changed_producer: Vec<EventProducer<InvoiceStatusEvent>>,
}

impl EventProducers {
    pub fn is_empty(&self) -> bool {
        self.status_changed_producer.is_empty()
    }
}

pub struct EventHandlers {
    status_changed: Vec<EventHandler<InvoiceStatusEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let status_changed = hooks.status_changed.into_iter().map(|f| EventHandler::new(buffer_size, f)).collect();
        Self { status_changed }
    }

    pub fn producers(&self) -> EventProducers {
        EventProducers { status_changed_producer: self.status_changed.iter().map(EventHandler::subscribe).collect() }
    }

    /// Spawns one task per hook. Each task ends once every producer handed out by [`Self::producers`] is dropped.
    pub async fn start_handlers(self) {
        debug!("📬️ Starting {} status hook(s)", self.status_changed.len());
        for handler in self.status_changed {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    status_changed: Vec<Handler<InvoiceStatusEvent>>,
}

impl EventHooks {
    /// Adds a hook that runs for every terminal transition. Hooks registered earlier are kept.
    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoiceStatusEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.status_changed.push(Arc::new(f));
        self
    }

    pub fn len(&self) -> usize {
        self.status_changed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.status_changed.is_empty()
    }
}
