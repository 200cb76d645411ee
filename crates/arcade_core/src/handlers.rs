//! Built-in event handlers shared by every game.

use crate::dispatch::{EventHandler, HandlerContext, HandlerRegistry};
use crate::event::{Event, EventKind, EventType, Input};
use crate::math::{Fixed, Vec2Fixed};
use crate::object::{Capabilities, InstanceId, ObjectKind, SimObject};
use crate::registry::ObjectRegistry;
use crate::world::SharedState;

/// Where a player appears when no spawn point exists.
pub const DEFAULT_PLAYER_POSITION: (i32, i32) = (120, 100);

const SPAWN_CURSOR: &str = "spawn_cursor";

/// Register [`DeathHandler`], [`DespawnHandler`], [`SpawnHandler`] and
/// [`InputHandler`].
pub fn register_core(handlers: &mut HandlerRegistry) {
    handlers.register(EventType::Death, Box::new(DeathHandler));
    handlers.register(EventType::Despawn, Box::new(DespawnHandler));
    handlers.register(EventType::Spawn, Box::new(SpawnHandler));
    handlers.register(EventType::Input, Box::new(InputHandler));
}

/// Position of the next spawn point in round-robin order.
///
/// The cursor lives in `shared`, so playback picks the same points.
pub fn next_spawn_position(registry: &ObjectRegistry, shared: &mut SharedState) -> Vec2Fixed {
    let points: Vec<Vec2Fixed> = registry
        .of_kind(ObjectKind::SpawnPoint)
        .map(|p| p.bounds.origin())
        .collect();
    if points.is_empty() {
        let (x, y) = DEFAULT_PLAYER_POSITION;
        return Vec2Fixed::from_ints(x, y);
    }
    let cursor = shared.get_or(SPAWN_CURSOR, 0);
    shared.set(SPAWN_CURSOR, cursor + 1);
    let index = usize::try_from(cursor).unwrap_or(0) % points.len();
    points[index]
}

/// Kills a `KILLABLE` target and removes it at commit, exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeathHandler;

impl EventHandler for DeathHandler {
    fn handle(&self, event: &Event, ctx: &mut HandlerContext<'_>, _during_replay: bool) {
        let EventKind::Death { target } = event.kind else {
            return;
        };
        if ctx.registry.is_removal_scheduled(target) {
            tracing::debug!(target, "object already dying");
            return;
        }
        let Some(object) = ctx.registry.get_mut(target) else {
            tracing::debug!(target, "death for unknown object skipped");
            return;
        };
        if !object.has(Capabilities::KILLABLE) {
            tracing::debug!(target, kind = ?object.kind, "death for unkillable object skipped");
            return;
        }
        object.kill();
        ctx.registry.schedule_removal(target);
    }
}

/// Removes its target at commit without a kill transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct DespawnHandler;

impl EventHandler for DespawnHandler {
    fn handle(&self, event: &Event, ctx: &mut HandlerContext<'_>, _during_replay: bool) {
        let EventKind::Despawn { target } = event.kind else {
            return;
        };
        if ctx.registry.contains(target) {
            ctx.registry.schedule_removal(target);
        } else {
            tracing::debug!(target, "despawn for unknown object skipped");
        }
    }
}

/// Inserts the carried object at commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnHandler;

impl EventHandler for SpawnHandler {
    fn handle(&self, event: &Event, ctx: &mut HandlerContext<'_>, _during_replay: bool) {
        let EventKind::Spawn { object } = &event.kind else {
            return;
        };
        if object.id != 0 && ctx.registry.contains(object.id) {
            tracing::debug!(id = object.id, "spawn of registered object skipped");
            return;
        }
        if let (ObjectKind::Player, Some(source)) = (object.kind, object.source) {
            if ctx.registry.player_id(source).is_some() || ctx.registry.has_pending_player(source) {
                tracing::debug!(source, "source already has a player");
                return;
            }
        }
        let id = ctx.registry.schedule_insert(SimObject::clone(object));
        tracing::trace!(id, kind = ?object.kind, "spawn scheduled");
    }
}

/// Routes inputs to the source's player object.
///
/// Operator commands become replay-control requests, except during replay
/// where they are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputHandler;

impl InputHandler {
    fn join(ctx: &mut HandlerContext<'_>, source: InstanceId) {
        if ctx.registry.player_id(source).is_some() || ctx.registry.has_pending_player(source) {
            tracing::debug!(source, "join ignored, player exists");
            return;
        }
        let position = next_spawn_position(ctx.registry, ctx.shared);
        let player = SimObject::player(source, position.x, position.y);
        ctx.emit(
            EventKind::Spawn {
                object: Box::new(player),
            },
            source,
        );
    }
}

impl EventHandler for InputHandler {
    fn handle(&self, event: &Event, ctx: &mut HandlerContext<'_>, during_replay: bool) {
        let EventKind::Input { input } = event.kind else {
            return;
        };

        match input {
            Input::Operator(command) => {
                if during_replay {
                    tracing::debug!(?command, "operator command ignored during replay");
                } else {
                    ctx.request(command);
                }
            }
            Input::Join => Self::join(ctx, event.source),
            held => {
                let Some(id) = ctx.registry.player_id(event.source) else {
                    tracing::debug!(source = event.source, %held, "input for source without player");
                    return;
                };
                let Some(player) = ctx.registry.get_mut(id) else {
                    return;
                };
                let keys = &mut player.state.input;
                match held {
                    Input::LeftPressed => keys.left = true,
                    Input::LeftReleased => keys.left = false,
                    Input::RightPressed => keys.right = true,
                    Input::RightReleased => keys.right = false,
                    Input::ActionPressed => keys.action = true,
                    Input::ActionReleased => keys.action = false,
                    Input::Join | Input::Operator(_) => {}
                }
            }
        }
    }
}

/// Half of `value`, for centring.
pub(crate) fn half(value: Fixed) -> Fixed {
    value / Fixed::from_num(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::event::OperatorCommand;
    use crate::queue::EventQueue;

    struct Harness {
        config: EngineConfig,
        registry: ObjectRegistry,
        shared: SharedState,
        queue: EventQueue,
        requests: Vec<crate::event::OperatorCommand>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                config: EngineConfig::default(),
                registry: ObjectRegistry::new(),
                shared: SharedState::default(),
                queue: EventQueue::new(),
                requests: Vec::new(),
            }
        }

        fn dispatch(&mut self, handler: &dyn EventHandler, kind: EventKind, source: InstanceId, during_replay: bool) {
            let event = Event::new(kind, 10, source);
            let mut ctx = HandlerContext {
                now: 10,
                player_count: self.registry.player_count(),
                config: &self.config,
                registry: &mut self.registry,
                shared: &mut self.shared,
                queue: &mut self.queue,
                requests: &mut self.requests,
                replaying: during_replay,
            };
            handler.handle(&event, &mut ctx, during_replay);
        }
    }

    #[test]
    fn test_death_removes_exactly_once() {
        let mut h = Harness::new();
        let id = h.registry.add(SimObject::player(1, Fixed::ZERO, Fixed::ZERO)).unwrap();

        h.dispatch(&DeathHandler, EventKind::Death { target: id }, 0, true);
        h.dispatch(&DeathHandler, EventKind::Death { target: id }, 0, true);
        assert!(!h.registry.get(id).unwrap().state.alive);

        let report = h.registry.commit().unwrap();
        assert_eq!(report.removed, vec![id]);

        // Stale reference after removal
        h.dispatch(&DeathHandler, EventKind::Death { target: id }, 0, true);
        assert!(h.registry.commit().unwrap().is_empty());
        assert!(h.requests.is_empty());
    }

    #[test]
    fn test_death_ignores_unkillable() {
        let mut h = Harness::new();
        let id = h.registry.add(SimObject::at(ObjectKind::Block, 0, 0)).unwrap();
        h.dispatch(&DeathHandler, EventKind::Death { target: id }, 0, false);
        assert!(h.registry.commit().unwrap().is_empty());
    }

    #[test]
    fn test_despawn_and_spawn() {
        let mut h = Harness::new();
        let block = h.registry.add(SimObject::at(ObjectKind::Block, 0, 0)).unwrap();
        h.dispatch(&DespawnHandler, EventKind::Despawn { target: block }, 0, false);
        h.dispatch(
            &SpawnHandler,
            EventKind::Spawn {
                object: Box::new(SimObject::at(ObjectKind::Bullet, 5, 5)),
            },
            0,
            false,
        );
        let report = h.registry.commit().unwrap();
        assert_eq!(report.removed, vec![block]);
        assert_eq!(report.inserted.len(), 1);
        assert!(h.registry.get(report.inserted[0]).unwrap().state.alive);
    }

    #[test]
    fn test_input_updates_held_keys() {
        let mut h = Harness::new();
        let id = h.registry.add(SimObject::player(3, Fixed::ZERO, Fixed::ZERO)).unwrap();
        h.dispatch(&InputHandler, EventKind::Input { input: Input::RightPressed }, 3, false);
        h.dispatch(&InputHandler, EventKind::Input { input: Input::ActionPressed }, 3, false);
        h.dispatch(&InputHandler, EventKind::Input { input: Input::ActionReleased }, 3, false);
        // No player for source 4
        h.dispatch(&InputHandler, EventKind::Input { input: Input::LeftPressed }, 4, false);

        let held = h.registry.get(id).unwrap().state.input;
        assert!(held.right);
        assert!(!held.action);
        assert!(!held.left);
    }

    #[test]
    fn test_operator_commands_suppressed_during_replay() {
        let mut h = Harness::new();
        let start = EventKind::Input {
            input: Input::Operator(OperatorCommand::StartRecording),
        };
        h.dispatch(&InputHandler, start.clone(), 0, true);
        assert!(h.requests.is_empty());

        h.dispatch(&InputHandler, start, 0, false);
        assert_eq!(h.requests, vec![OperatorCommand::StartRecording]);
    }

    #[test]
    fn test_join_uses_spawn_points_round_robin() {
        let mut h = Harness::new();
        h.registry.add(SimObject::at(ObjectKind::SpawnPoint, 100, 50)).unwrap();
        h.registry.add(SimObject::at(ObjectKind::SpawnPoint, 300, 50)).unwrap();

        h.dispatch(&InputHandler, EventKind::Input { input: Input::Join }, 1, false);
        h.dispatch(&InputHandler, EventKind::Input { input: Input::Join }, 2, false);

        let spawned: Vec<_> = h
            .queue
            .drain_due(11)
            .into_iter()
            .filter_map(|e| match e.kind {
                EventKind::Spawn { object } => Some(object.bounds.x),
                _ => None,
            })
            .collect();
        assert_eq!(spawned, vec![Fixed::from_num(100), Fixed::from_num(300)]);
    }

    #[test]
    fn test_second_spawn_for_source_is_dropped() {
        let mut h = Harness::new();
        for _ in 0..2 {
            h.dispatch(
                &SpawnHandler,
                EventKind::Spawn {
                    object: Box::new(SimObject::player(9, Fixed::ZERO, Fixed::ZERO)),
                },
                9,
                false,
            );
        }
        let report = h.registry.commit().unwrap();
        assert_eq!(report.inserted.len(), 1);
        assert_eq!(h.registry.player_count(), 1);
    }

    #[test]
    fn test_half() {
        assert_eq!(half(Fixed::from_num(30)), Fixed::from_num(15));
    }
}
