//! Event handler registration and dispatch.
//!
//! Any number of handlers may be registered for an [`EventType`]; they run
//! in registration order, each exactly once per drained event.

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::event::{Event, EventKind, EventType, OperatorCommand, Tick};
use crate::object::InstanceId;
use crate::queue::EventQueue;
use crate::registry::ObjectRegistry;
use crate::world::SharedState;

/// Procedure invoked when an event of a given type comes due.
pub trait EventHandler {
    /// Handle `event`. `during_replay` is set while a recording plays back;
    /// operator-facing effects must be skipped then.
    fn handle(&self, event: &Event, ctx: &mut HandlerContext<'_>, during_replay: bool);
}

/// Mutation rights granted to an event handler.
///
/// Removals and insertions go through the registry's deferred operations
/// and become visible at commit.
pub struct HandlerContext<'a> {
    /// Authoritative clock.
    pub now: Tick,
    /// Authoritative player count.
    pub player_count: usize,
    /// Engine settings.
    pub config: &'a EngineConfig,
    /// Object registry.
    pub registry: &'a mut ObjectRegistry,
    /// World-wide counters shared by a game's policies.
    pub shared: &'a mut SharedState,
    pub(crate) queue: &'a mut EventQueue,
    pub(crate) requests: &'a mut Vec<OperatorCommand>,
    pub(crate) replaying: bool,
}

impl HandlerContext<'_> {
    /// Schedule an event for `now + event_delay`.
    pub fn emit(&mut self, kind: EventKind, source: InstanceId) -> Tick {
        self.emit_after(kind, source, self.config.event_delay)
    }

    /// Schedule an event `delay` ticks from now. A zero delay becomes one.
    pub fn emit_after(&mut self, kind: EventKind, source: InstanceId, delay: u64) -> Tick {
        self.queue
            .schedule(kind, self.now, delay, source, self.replaying)
    }

    /// Ask the replay manager to run `command` at the end of this tick.
    pub fn request(&mut self, command: OperatorCommand) {
        self.requests.push(command);
    }
}

/// Handle returned by [`HandlerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

type Slot = (HandlerId, Box<dyn EventHandler>);

/// Handlers keyed by event type.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<EventType, Vec<Slot>>,
    next_id: u64,
}

impl HandlerRegistry {
    /// Create a registry with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in death, despawn, spawn and input
    /// handlers.
    #[must_use]
    pub fn with_core_handlers() -> Self {
        let mut registry = Self::new();
        crate::handlers::register_core(&mut registry);
        registry
    }

    /// Register `handler` for `event_type`, after any existing ones.
    pub fn register(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(event_type).or_default().push((id, handler));
        id
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        for slots in self.handlers.values_mut() {
            if let Some(index) = slots.iter().position(|(slot_id, _)| *slot_id == id) {
                slots.remove(index);
                return true;
            }
        }
        false
    }

    /// Number of handlers for `event_type`.
    #[must_use]
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers.get(&event_type).map_or(0, Vec::len)
    }

    /// Run every handler registered for the event's type. Returns how many
    /// ran.
    pub fn dispatch(&self, event: &Event, ctx: &mut HandlerContext<'_>, during_replay: bool) -> usize {
        let Some(slots) = self.handlers.get(&event.event_type()) else {
            tracing::trace!(kind = ?event.event_type(), "no handler registered");
            return 0;
        };
        for (_, handler) in slots {
            handler.handle(event, ctx, during_replay);
        }
        tracing::trace!(
            kind = ?event.event_type(),
            timestamp = event.timestamp,
            handlers = slots.len(),
            "dispatched event"
        );
        slots.len()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<_, _> = self.handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Tagger {
        tag: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl EventHandler for Tagger {
        fn handle(&self, _event: &Event, _ctx: &mut HandlerContext<'_>, _during_replay: bool) {
            self.log.borrow_mut().push(self.tag);
        }
    }

    fn run(handlers: &HandlerRegistry, event: &Event) -> usize {
        let config = EngineConfig::default();
        let mut registry = ObjectRegistry::new();
        let mut shared = SharedState::default();
        let mut queue = EventQueue::new();
        let mut requests = Vec::new();
        let mut ctx = HandlerContext {
            now: event.timestamp,
            player_count: 0,
            config: &config,
            registry: &mut registry,
            shared: &mut shared,
            queue: &mut queue,
            requests: &mut requests,
            replaying: false,
        };
        handlers.dispatch(event, &mut ctx, false)
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut handlers = HandlerRegistry::new();
        for tag in ["first", "second"] {
            handlers.register(
                EventType::Death,
                Box::new(Tagger {
                    tag,
                    log: Rc::clone(&log),
                }),
            );
        }

        let event = Event::new(EventKind::Death { target: 1 }, 1, 0);
        assert_eq!(run(&handlers, &event), 2);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_unregister() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut handlers = HandlerRegistry::new();
        let id = handlers.register(
            EventType::Spawn,
            Box::new(Tagger {
                tag: "spawn",
                log: Rc::clone(&log),
            }),
        );
        assert_eq!(handlers.handler_count(EventType::Spawn), 1);
        assert!(handlers.unregister(id));
        assert!(!handlers.unregister(id));
        assert_eq!(handlers.handler_count(EventType::Spawn), 0);

        let event = Event::new(EventKind::Despawn { target: 1 }, 1, 0);
        assert_eq!(run(&handlers, &event), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_core_handlers_cover_core_types() {
        let handlers = HandlerRegistry::with_core_handlers();
        for event_type in [
            EventType::Death,
            EventType::Despawn,
            EventType::Spawn,
            EventType::Input,
        ] {
            assert_eq!(handlers.handler_count(event_type), 1);
        }
        assert_eq!(handlers.handler_count(EventType::Collision), 0);
    }
}
