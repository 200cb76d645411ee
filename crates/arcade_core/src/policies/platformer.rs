//! Platformer policies: a gravity-bound player, patrolling platforms and
//! death zones.

use crate::behavior::{Behavior, SimContext};
use crate::collision::{self, Axis};
use crate::dispatch::{EventHandler, HandlerContext};
use crate::event::{Event, EventKind};
use crate::handlers::next_spawn_position;
use crate::math::{Fixed, Vec2Fixed};
use crate::object::{BehaviorState, ObjectKind, SimObject};

/// Downward acceleration per tick, as a fraction `1/5`.
fn gravity() -> Fixed {
    Fixed::from_num(1) / Fixed::from_num(5)
}

/// Terminal fall speed.
pub const MAX_FALL_SPEED: i32 = 15;

/// Upward speed given by a jump.
pub const JUMP_SPEED: i32 = 7;

/// Ticks between a player's death and its respawn.
pub const RESPAWN_DELAY: u64 = 60;

const RESPAWN_SCHEDULED: &str = "respawn_scheduled";

/// Held left/right walk, jump when grounded, gravity, platform riding.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerBehavior;

impl Behavior for PlayerBehavior {
    fn update(&self, player: &mut SimObject, ctx: &mut SimContext<'_>) {
        if !player.state.alive {
            return;
        }
        let motion = ctx.motion();
        let me = Some(player.id);

        let grounded = collision::is_blocked_toward(
            ctx.registry,
            &player.bounds,
            me,
            Axis::Vertical,
            1,
            motion.step_unit,
        );

        let mut vy = player.state.velocity.y;
        if grounded {
            if player.state.input.action {
                vy = -Fixed::from_num(JUMP_SPEED);
            } else if vy > Fixed::ZERO {
                vy = Fixed::ZERO;
            }
        } else {
            vy = (vy + gravity()).min(Fixed::from_num(MAX_FALL_SPEED));
        }

        let direction = player.state.input.direction();
        let vx = player.state.speed * Fixed::from_num(direction);
        let carry = if grounded {
            collision::platform_carry(ctx.registry, &player.bounds, me, motion.step_unit)
        } else {
            Vec2Fixed::ZERO
        };

        let result = collision::resolve_motion(
            ctx.registry,
            &player.bounds,
            me,
            Vec2Fixed::new(vx + carry.x, vy),
            &motion,
        );
        player.bounds = result.bounds;
        player.state.velocity = Vec2Fixed::new(vx, result.velocity.y);
        player.state.direction = direction;

        // Hazards and other non-blocking contacts
        let contacts: Vec<_> = collision::overlapping(ctx.registry, &player.bounds, me)
            .into_iter()
            .filter(|id| ctx.registry.get(*id).is_some_and(|o| !o.is_physical()))
            .collect();
        let source = player.source.unwrap_or_default();
        for other in contacts {
            ctx.emit(
                EventKind::Collision {
                    a: player.id,
                    b: other,
                },
                source,
            );
        }
    }
}

/// Patrols horizontally, reversing at obstacles and the border.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovingPlatformBehavior;

impl Behavior for MovingPlatformBehavior {
    fn update(&self, platform: &mut SimObject, ctx: &mut SimContext<'_>) {
        let direction = if platform.state.direction == 0 {
            1
        } else {
            platform.state.direction
        };
        let displacement = platform.state.speed * Fixed::from_num(direction);

        let (moved, blocked) = collision::resolve_axis(
            ctx.registry,
            &platform.bounds,
            Some(platform.id),
            Axis::Horizontal,
            displacement,
            &ctx.motion(),
        );

        platform.state.velocity = Vec2Fixed::new(moved.x - platform.bounds.x, Fixed::ZERO);
        platform.bounds = moved;
        platform.state.direction = if blocked { -direction } else { direction };
    }
}

/// Player touching a death zone dies.
///
/// Collisions are regenerated during playback, so the death is issued in
/// both modes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionHandler;

impl EventHandler for CollisionHandler {
    fn handle(&self, event: &Event, ctx: &mut HandlerContext<'_>, _during_replay: bool) {
        let EventKind::Collision { a, b } = event.kind else {
            return;
        };
        let (Some(first), Some(second)) = (ctx.registry.get(a), ctx.registry.get(b)) else {
            tracing::debug!(a, b, "collision with a removed object skipped");
            return;
        };
        let victim = match (first.kind, second.kind) {
            (ObjectKind::Player, ObjectKind::DeathZone) => a,
            (ObjectKind::DeathZone, ObjectKind::Player) => b,
            _ => return,
        };
        ctx.emit(EventKind::Death { target: victim }, event.source);
    }
}

/// Schedules a fresh player at a spawn point after a dead one is removed.
///
/// Registered after the core death handler. Runs once per dead player.
#[derive(Debug, Clone, Copy, Default)]
pub struct RespawnHandler;

impl EventHandler for RespawnHandler {
    fn handle(&self, event: &Event, ctx: &mut HandlerContext<'_>, _during_replay: bool) {
        let EventKind::Death { target } = event.kind else {
            return;
        };
        let Some(dead) = ctx.registry.get_mut(target) else {
            return;
        };
        if dead.kind != ObjectKind::Player
            || dead.state.alive
            || dead.state.timer(RESPAWN_SCHEDULED).is_some()
        {
            return;
        }
        dead.state.set_timer(RESPAWN_SCHEDULED, 1);

        let mut fresh = dead.clone();
        fresh.id = 0;
        fresh.state = BehaviorState {
            speed: dead.state.speed,
            ..BehaviorState::default()
        };

        let position = next_spawn_position(ctx.registry, ctx.shared);
        fresh.bounds.x = position.x;
        fresh.bounds.y = position.y;

        ctx.emit_after(
            EventKind::Spawn {
                object: Box::new(fresh),
            },
            event.source,
            RESPAWN_DELAY,
        );
    }
}
