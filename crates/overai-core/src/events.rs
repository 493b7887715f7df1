//! Typed events published to the web view and menu bar collaborators.
//!
//! Delivery is synchronous and in subscription order, on whichever thread
//! drives the coordinator (the main event loop).

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum OverlayEvent {
    ToggleRequested,
    VisibilityChanged(bool),
    OpacityChanged(f64),
    ServiceSelected(String),
}

impl OverlayEvent {
    /// Event name used when forwarding to the frontend.
    pub fn name(&self) -> &'static str {
        match self {
            OverlayEvent::ToggleRequested => "toggle-requested",
            OverlayEvent::VisibilityChanged(_) => "visibility-changed",
            OverlayEvent::OpacityChanged(_) => "opacity-changed",
            OverlayEvent::ServiceSelected(_) => "service-selected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&OverlayEvent) + Send>;

#[derive(Default)]
pub struct EventEmitter {
    handlers: Vec<(SubscriptionId, Handler)>,
    next_id: u64,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&OverlayEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sub, _)| *sub != id);
        self.handlers.len() != before
    }

    pub fn emit(&mut self, event: OverlayEvent) {
        tracing::trace!(event = event.name(), "Emitting overlay event");
        for (_, handler) in &mut self.handlers {
            handler(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn delivers_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut emitter = EventEmitter::new();

        let first = log.clone();
        emitter.subscribe(move |e| first.lock().unwrap().push(format!("a:{}", e.name())));
        let second = log.clone();
        emitter.subscribe(move |e| second.lock().unwrap().push(format!("b:{}", e.name())));

        emitter.emit(OverlayEvent::VisibilityChanged(true));
        emitter.emit(OverlayEvent::OpacityChanged(0.5));

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:visibility-changed",
                "b:visibility-changed",
                "a:opacity-changed",
                "b:opacity-changed",
            ]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let mut emitter = EventEmitter::new();
        let c = count.clone();
        let id = emitter.subscribe(move |_| *c.lock().unwrap() += 1);

        emitter.emit(OverlayEvent::ToggleRequested);
        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));
        emitter.emit(OverlayEvent::ToggleRequested);

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(emitter.is_empty());
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(OverlayEvent::ServiceSelected("claude".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "serviceSelected", "value": "claude"}));
    }
}
