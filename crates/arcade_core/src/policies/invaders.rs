//! Invaders policies: a marching fleet, a shooter at the bottom, bullets.
//!
//! Fleet-wide values live in [`SharedState`](crate::world::SharedState) so
//! snapshots and playback carry them:
//!
//! - `fleet_delay_x10`: ticks between fleet moves, in tenths.
//! - `fleet_turn_time`: tick at which the fleet next drops and turns.
//! - `game_over`: set once a win or loss marker has been placed.

use crate::behavior::{Behavior, SimContext};
use crate::collision::{self, Axis};
use crate::dispatch::{EventHandler, HandlerContext};
use crate::event::{Event, EventKind, Tick};
use crate::handlers::half;
use crate::math::{Fixed, Vec2Fixed};
use crate::object::{ObjectKind, SimObject};

/// Horizontal distance the fleet covers per move.
pub const FLEET_SPEED: i32 = 5;

/// Vertical drop when the fleet turns.
pub const FLEET_DROP: i32 = 20;

/// An invader below this line ends the game.
pub const LOSS_LINE: i32 = 773;

/// Distance from the side borders at which the fleet turns.
pub const EDGE_MARGIN: i32 = 20;

/// Initial ticks between fleet moves, in tenths.
pub const INITIAL_DELAY_X10: i64 = 300;

/// Fleet speed-up per destroyed invader, in tenths of a tick.
pub const DELAY_STEP_X10: i64 = 15;

/// Fastest fleet pace, in tenths.
pub const MIN_DELAY_X10: i64 = 30;

const DELAY_KEY: &str = "fleet_delay_x10";
const TURN_KEY: &str = "fleet_turn_time";
const GAME_OVER_KEY: &str = "game_over";
const LAST_TURNED: &str = "last_turned";
const LAST_SHOT: &str = "last_shot";
const EXPIRED: &str = "expired";
const SPENT: &str = "spent";
const DEATH_HANDLED: &str = "death_handled";

fn as_timer(tick: Tick) -> i64 {
    i64::try_from(tick).unwrap_or(i64::MAX)
}

/// Whole ticks between fleet moves for the current pace.
#[must_use]
pub fn fleet_delay(delay_x10: i64) -> i64 {
    (delay_x10.max(MIN_DELAY_X10) / 10).max(1)
}

fn screen_width(ctx: &SimContext<'_>) -> Fixed {
    ctx.config
        .bounds
        .map_or(Fixed::from_num(crate::config::DEFAULT_WORLD_SIZE), |b| b.right())
}

/// One member of the fleet.
///
/// Every fleet delay the invader either steps sideways or, once a turn is
/// due, drops a row and reverses. Touching a side margin schedules the
/// turn for the whole fleet one delay later.
#[derive(Debug, Clone, Copy, Default)]
pub struct FleetBehavior;

impl Behavior for FleetBehavior {
    fn update(&self, invader: &mut SimObject, ctx: &mut SimContext<'_>) {
        let delay = fleet_delay(ctx.shared.get_or(DELAY_KEY, INITIAL_DELAY_X10));
        let now = as_timer(ctx.now);
        if now % delay != 0 {
            return;
        }

        let turn_time = ctx.shared.get_or(TURN_KEY, 0);
        let last_turned = invader.state.timer(LAST_TURNED).unwrap_or(0);
        let direction = if invader.state.direction == 0 {
            1
        } else {
            invader.state.direction
        };

        if now >= turn_time && turn_time > last_turned {
            if ctx.player_count > 0 {
                invader.bounds.y += Fixed::from_num(FLEET_DROP);
                if invader.bounds.y > Fixed::from_num(LOSS_LINE) {
                    overrun(ctx, invader);
                }
            }
            invader.state.direction = -direction;
            invader.state.set_timer(LAST_TURNED, now);
            return;
        }

        invader.bounds.x += Fixed::from_num(FLEET_SPEED * direction);
        invader.state.direction = direction;

        let margin = Fixed::from_num(EDGE_MARGIN);
        let at_edge = if direction > 0 {
            invader.bounds.right() > screen_width(ctx) - margin
        } else {
            invader.bounds.x < margin
        };
        if at_edge {
            ctx.shared.set(TURN_KEY, now + delay);
        }
    }
}

/// The fleet reached the bottom: every player dies.
fn overrun(ctx: &mut SimContext<'_>, invader: &SimObject) {
    tracing::info!(invader = invader.id, tick = ctx.now, "fleet reached the bottom");
    let players: Vec<_> = ctx
        .registry
        .of_kind(ObjectKind::Player)
        .map(|p| (p.id, p.source.unwrap_or_default()))
        .collect();
    for (target, source) in players {
        ctx.emit(EventKind::Death { target }, source);
    }
}

/// Player ship: held left/right movement inside the border, firing one
/// bullet at a time while action is held.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShooterBehavior;

impl Behavior for ShooterBehavior {
    fn update(&self, ship: &mut SimObject, ctx: &mut SimContext<'_>) {
        if !ship.state.alive {
            return;
        }
        let direction = ship.state.input.direction();
        let (moved, _) = collision::resolve_axis(
            ctx.registry,
            &ship.bounds,
            Some(ship.id),
            Axis::Horizontal,
            ship.state.speed * Fixed::from_num(direction),
            &ctx.motion(),
        );
        ship.state.velocity = Vec2Fixed::new(moved.x - ship.bounds.x, Fixed::ZERO);
        ship.bounds = moved;
        ship.state.direction = direction;

        let source = ship.source.unwrap_or_default();
        let invaders: Vec<_> = collision::overlapping(ctx.registry, &ship.bounds, Some(ship.id))
            .into_iter()
            .filter(|id| ctx.registry.get(*id).is_some_and(|o| o.kind == ObjectKind::Invader))
            .collect();
        for invader in invaders {
            ctx.emit(EventKind::Collision { a: ship.id, b: invader }, source);
        }

        if ship.state.input.action && can_fire(ship, ctx) {
            let x = ship.bounds.x + half(ship.bounds.width) - Fixed::from_num(5);
            let y = ship.bounds.y - Fixed::from_num(10);
            let bullet = SimObject::bullet(ship.id, ship.source, x, y);
            ship.state.set_timer(LAST_SHOT, as_timer(ctx.now));
            ctx.emit(
                EventKind::Spawn {
                    object: Box::new(bullet),
                },
                source,
            );
        }
    }
}

/// One bullet in flight per ship, and none while the last spawn is pending.
fn can_fire(ship: &SimObject, ctx: &SimContext<'_>) -> bool {
    let in_flight = ctx.registry.of_kind(ObjectKind::Bullet).any(|b| {
        b.owner == Some(ship.id) && !ctx.registry.is_removal_scheduled(b.id)
    });
    if in_flight {
        return false;
    }
    ship.state
        .timer(LAST_SHOT)
        .map_or(true, |last| as_timer(ctx.now) - last > as_timer(ctx.config.event_delay))
}

/// Straight-line projectile that expires above the screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulletBehavior;

impl Behavior for BulletBehavior {
    fn update(&self, bullet: &mut SimObject, ctx: &mut SimContext<'_>) {
        // A bullet that already hit something waits for its removal.
        if bullet.state.timer(SPENT).is_some() {
            return;
        }
        let velocity = Vec2Fixed::new(
            Fixed::ZERO,
            bullet.state.speed * Fixed::from_num(bullet.state.direction),
        );
        bullet.bounds = bullet.bounds.translated(velocity);
        bullet.state.velocity = velocity;

        let source = bullet.source.unwrap_or_default();
        if bullet.bounds.y <= Fixed::from_num(-10) && bullet.state.timer(EXPIRED).is_none() {
            bullet.state.set_timer(EXPIRED, as_timer(ctx.now));
            ctx.emit(EventKind::Death { target: bullet.id }, source);
        }

        for other in collision::overlapping(ctx.registry, &bullet.bounds, Some(bullet.id)) {
            ctx.emit(EventKind::Collision { a: bullet.id, b: other }, source);
        }
    }
}

/// Ship touching an invader dies; a bullet hitting one destroys both.
/// A bullet is spent by its first hit and destroys nothing else.
///
/// Collisions are regenerated during playback, so deaths are issued in
/// both modes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionHandler;

impl EventHandler for CollisionHandler {
    fn handle(&self, event: &Event, ctx: &mut HandlerContext<'_>, _during_replay: bool) {
        let EventKind::Collision { a, b } = event.kind else {
            return;
        };
        let (Some(first), Some(second)) = (ctx.registry.get(a), ctx.registry.get(b)) else {
            return;
        };
        match (first.kind, second.kind) {
            (ObjectKind::Player, ObjectKind::Invader) => {
                ctx.emit(EventKind::Death { target: a }, event.source);
            }
            (ObjectKind::Bullet, ObjectKind::Invader) => {
                if first.state.timer(SPENT).is_some() {
                    return;
                }
                if let Some(bullet) = ctx.registry.get_mut(a) {
                    bullet.state.set_timer(SPENT, as_timer(ctx.now));
                }
                ctx.emit(EventKind::Death { target: a }, event.source);
                ctx.emit(EventKind::Death { target: b }, event.source);
            }
            _ => {}
        }
    }
}

/// Game outcome on deaths: a dead ship loses the game, the last dead
/// invader wins it. Each invader kill also speeds up the fleet.
///
/// Registered after the core death handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeathHandler;

impl DeathHandler {
    fn end_game(ctx: &mut HandlerContext<'_>, text: &str) {
        if ctx.shared.flag(GAME_OVER_KEY) {
            return;
        }
        ctx.shared.set(GAME_OVER_KEY, 1);
        tracing::info!(tick = ctx.now, outcome = text, "game over");
        ctx.registry.schedule_insert(SimObject::marker(text, 300, 300));
    }
}

impl EventHandler for DeathHandler {
    fn handle(&self, event: &Event, ctx: &mut HandlerContext<'_>, _during_replay: bool) {
        let EventKind::Death { target } = event.kind else {
            return;
        };
        if !ctx.registry.is_removal_scheduled(target) {
            return;
        }
        let Some(dead) = ctx.registry.get_mut(target) else {
            return;
        };
        if dead.state.timer(DEATH_HANDLED).is_some() {
            return;
        }
        dead.state.set_timer(DEATH_HANDLED, as_timer(ctx.now));
        let kind = dead.kind;

        match kind {
            ObjectKind::Player => {
                let fleet: Vec<_> = ctx.registry.of_kind(ObjectKind::Invader).map(|o| o.id).collect();
                for id in fleet {
                    ctx.registry.schedule_removal(id);
                }
                Self::end_game(ctx, "YOU LOSE");
            }
            ObjectKind::Invader => {
                let delay = ctx.shared.get_or(DELAY_KEY, INITIAL_DELAY_X10);
                ctx.shared
                    .set(DELAY_KEY, (delay - DELAY_STEP_X10).max(MIN_DELAY_X10));

                let remaining = ctx
                    .registry
                    .of_kind(ObjectKind::Invader)
                    .filter(|o| !ctx.registry.is_removal_scheduled(o.id))
                    .count();
                if remaining == 0 {
                    Self::end_game(ctx, "YOU WIN");
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::event::Input;
    use crate::instance::GameInstance;
    use crate::policies::Game;

    fn invaders() -> GameInstance {
        Game::Invaders.instance(EngineConfig::default()).unwrap()
    }

    fn invader(x: i32, y: i32) -> SimObject {
        SimObject::at(ObjectKind::Invader, x, y).with_direction(1)
    }

    fn labels(game: &GameInstance) -> Vec<String> {
        game.view()
            .of_kind(ObjectKind::Marker)
            .filter_map(|m| m.label.clone())
            .collect()
    }

    #[test]
    fn test_fleet_delay_floor() {
        assert_eq!(fleet_delay(INITIAL_DELAY_X10), 30);
        assert_eq!(fleet_delay(285), 28);
        assert_eq!(fleet_delay(0), 3);
    }

    #[test]
    fn test_fleet_moves_on_its_delay() {
        let mut game = invaders();
        let id = game.add_object(invader(100, 60)).unwrap();

        game.run(29).unwrap();
        assert_eq!(game.world().registry().get(id).unwrap().bounds.x, Fixed::from_num(100));
        game.tick().unwrap();
        assert_eq!(game.world().registry().get(id).unwrap().bounds.x, Fixed::from_num(105));
    }

    #[test]
    fn test_fleet_drops_and_turns_at_edge() {
        let mut game = invaders();
        game.add_object(SimObject::player(1, Fixed::from_num(385), Fixed::from_num(740)))
            .unwrap();
        let id = game.add_object(invader(740, 60)).unwrap();

        // Edge reached on tick 30, turn on tick 60
        game.run(60).unwrap();
        let turned = game.world().registry().get(id).unwrap();
        assert_eq!(turned.bounds.x, Fixed::from_num(745));
        assert_eq!(turned.bounds.y, Fixed::from_num(80));
        assert_eq!(turned.state.direction, -1);

        game.run(30).unwrap();
        let turned = game.world().registry().get(id).unwrap();
        assert_eq!(turned.bounds.x, Fixed::from_num(740));
    }

    #[test]
    fn test_bullet_destroys_last_invader_and_wins() {
        let mut game = invaders();
        let target = game.add_object(invader(380, 600)).unwrap();
        game.add_object(SimObject::player(1, Fixed::from_num(385), Fixed::from_num(740)))
            .unwrap();

        game.submit_input(1, Input::ActionPressed);
        game.run(25).unwrap();

        assert!(game.world().registry().get(target).is_none());
        assert_eq!(labels(&game), vec!["YOU WIN".to_string()]);
        assert_eq!(
            game.world().shared().get(DELAY_KEY),
            Some(INITIAL_DELAY_X10 - DELAY_STEP_X10)
        );
    }

    #[test]
    fn test_spent_bullet_does_not_hit_again() {
        let mut game = invaders();
        let first = game.add_object(invader(380, 600)).unwrap();
        let second = game.add_object(invader(380, 570)).unwrap();
        let bullet = game
            .add_object(SimObject::bullet(999, None, Fixed::from_num(395), Fixed::from_num(605)))
            .unwrap();

        game.run(6).unwrap();
        let registry = game.world().registry();
        assert!(registry.get(first).is_none());
        assert!(registry.get(bullet).is_none());
        assert!(registry.get(second).is_some());
        assert_eq!(
            game.world().shared().get(DELAY_KEY),
            Some(INITIAL_DELAY_X10 - DELAY_STEP_X10)
        );
        assert!(labels(&game).is_empty());
    }

    #[test]
    fn test_one_bullet_in_flight() {
        let mut game = invaders();
        game.add_object(SimObject::player(1, Fixed::from_num(385), Fixed::from_num(740)))
            .unwrap();
        game.submit_input(1, Input::ActionPressed);
        game.run(10).unwrap();
        assert_eq!(game.view().of_kind(ObjectKind::Bullet).count(), 1);
    }

    #[test]
    fn test_fleet_reaching_bottom_loses() {
        let mut game = invaders();
        game.add_object(invader(745, 760)).unwrap();
        game.add_object(invader(100, 100)).unwrap();
        game.add_object(SimObject::player(1, Fixed::from_num(385), Fixed::from_num(740)))
            .unwrap();

        game.run(61).unwrap();
        assert_eq!(game.view().of_kind(ObjectKind::Invader).count(), 0);
        assert_eq!(game.player_count(), 0);
        assert_eq!(labels(&game), vec!["YOU LOSE".to_string()]);
    }
}
