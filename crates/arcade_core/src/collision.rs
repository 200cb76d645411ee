//! Axis-aligned collision queries and stepped motion resolution.
//!
//! Everything here is a pure function of registry state. An empty result
//! is a normal outcome; nothing in this module fails.
//!
//! # Stepped motion
//!
//! A mover first tests the whole swept region of its displacement. If that
//! region is clear it moves in one go. Otherwise it advances one
//! `step_unit` at a time until the span swept by the next step would
//! overlap, then closes the remaining gap exactly, so it always comes to
//! rest flush against the obstacle and never inside or beyond it. Horizontal motion is resolved
//! before vertical motion.

use crate::math::{signum, Fixed, Rect, Vec2Fixed};
use crate::object::{ObjectId, ObjectKind};
use crate::registry::ObjectRegistry;

/// Movement axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// X axis.
    Horizontal,
    /// Y axis (grows downward).
    Vertical,
}

impl Axis {
    fn vector(self, amount: Fixed) -> Vec2Fixed {
        match self {
            Self::Horizontal => Vec2Fixed::new(amount, Fixed::ZERO),
            Self::Vertical => Vec2Fixed::new(Fixed::ZERO, amount),
        }
    }
}

/// Parameters for stepped motion resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionConfig {
    /// Discrete advance while approaching an obstacle.
    pub step_unit: Fixed,
    /// Playable area, treated as a solid border.
    pub bounds: Option<Rect>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            step_unit: Fixed::from_num(1),
            bounds: None,
        }
    }
}

impl From<&crate::config::EngineConfig> for MotionConfig {
    fn from(config: &crate::config::EngineConfig) -> Self {
        Self {
            step_unit: config.step_unit,
            bounds: config.bounds,
        }
    }
}

/// Outcome of resolving one object's motion for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionResult {
    /// Final bounding box.
    pub bounds: Rect,
    /// Velocity after resolution; a blocked axis is zeroed.
    pub velocity: Vec2Fixed,
    /// Horizontal motion hit an obstacle or the border.
    pub blocked_x: bool,
    /// Vertical motion hit an obstacle or the border.
    pub blocked_y: bool,
}

/// Ids of `PHYSICAL` objects whose box overlaps `rect`, in id order.
#[must_use]
pub fn overlap_query(registry: &ObjectRegistry, rect: &Rect, exclude: Option<ObjectId>) -> Vec<ObjectId> {
    registry
        .all()
        .filter(|o| o.is_physical() && Some(o.id) != exclude && o.bounds.intersects(rect))
        .map(|o| o.id)
        .collect()
}

/// Whether any `PHYSICAL` object other than `exclude` overlaps `rect`.
#[must_use]
pub fn is_blocked(registry: &ObjectRegistry, rect: &Rect, exclude: Option<ObjectId>) -> bool {
    registry
        .all()
        .any(|o| o.is_physical() && Some(o.id) != exclude && o.bounds.intersects(rect))
}

/// Every object, physical or not, overlapping `rect`, except `exclude`.
#[must_use]
pub fn overlapping(registry: &ObjectRegistry, rect: &Rect, exclude: Option<ObjectId>) -> Vec<ObjectId> {
    registry
        .all()
        .filter(|o| Some(o.id) != exclude && o.bounds.intersects(rect))
        .map(|o| o.id)
        .collect()
}

/// Every other object, physical or not, overlapping the object `id`.
///
/// Used to raise collision events between things that react to contact
/// without blocking each other. Returns nothing for an unknown id.
#[must_use]
pub fn touching(registry: &ObjectRegistry, id: ObjectId) -> Vec<ObjectId> {
    registry
        .get(id)
        .map(|subject| overlapping(registry, &subject.bounds, Some(id)))
        .unwrap_or_default()
}

/// Thin rectangle of thickness `depth` lying flush against one edge of
/// `rect`, on the side given by `direction`.
///
/// Probing with it makes an obstacle that merely touches the edge count as
/// blocking.
#[must_use]
pub fn contact_rect(rect: &Rect, axis: Axis, direction: i32, depth: Fixed) -> Rect {
    match (axis, direction >= 0) {
        (Axis::Horizontal, true) => Rect::new(rect.right(), rect.y, depth, rect.height),
        (Axis::Horizontal, false) => Rect::new(rect.x - depth, rect.y, depth, rect.height),
        (Axis::Vertical, true) => Rect::new(rect.x, rect.bottom(), rect.width, depth),
        (Axis::Vertical, false) => Rect::new(rect.x, rect.y - depth, rect.width, depth),
    }
}

/// Whether motion from `rect` along `axis` in `direction` is blocked
/// right now. Touching edges count.
#[must_use]
pub fn is_blocked_toward(
    registry: &ObjectRegistry,
    rect: &Rect,
    exclude: Option<ObjectId>,
    axis: Axis,
    direction: i32,
    depth: Fixed,
) -> bool {
    if direction == 0 {
        return false;
    }
    is_blocked(registry, &contact_rect(rect, axis, direction, depth), exclude)
}

/// `PHYSICAL` objects directly beneath `rect`.
#[must_use]
pub fn standing_on(
    registry: &ObjectRegistry,
    rect: &Rect,
    exclude: Option<ObjectId>,
    depth: Fixed,
) -> Vec<ObjectId> {
    overlap_query(registry, &contact_rect(rect, Axis::Vertical, 1, depth), exclude)
}

/// Summed per-tick displacement of the moving platforms under `rect`.
///
/// Queried afresh every tick; a rider that steps off keeps nothing.
#[must_use]
pub fn platform_carry(
    registry: &ObjectRegistry,
    rect: &Rect,
    exclude: Option<ObjectId>,
    depth: Fixed,
) -> Vec2Fixed {
    standing_on(registry, rect, exclude, depth)
        .into_iter()
        .filter_map(|id| registry.get(id))
        .filter(|o| o.kind == ObjectKind::MovingPlatform)
        .fold(Vec2Fixed::ZERO, |acc, platform| {
            acc + Vec2Fixed::new(platform.state.velocity.x, Fixed::ZERO)
        })
}

/// Physical ids already overlapping the mover before it moves. They are
/// ignored so an embedded object can still move out.
fn embedded_in(registry: &ObjectRegistry, rect: &Rect, exclude: Option<ObjectId>) -> Vec<ObjectId> {
    overlap_query(registry, rect, exclude)
}

fn hits(
    registry: &ObjectRegistry,
    rect: &Rect,
    exclude: Option<ObjectId>,
    ignore: &[ObjectId],
) -> Vec<Rect> {
    registry
        .all()
        .filter(|o| {
            o.is_physical()
                && Some(o.id) != exclude
                && !ignore.contains(&o.id)
                && o.bounds.intersects(rect)
        })
        .map(|o| o.bounds)
        .collect()
}

fn leaves_bounds(bounds: Option<&Rect>, start: &Rect, candidate: &Rect) -> bool {
    match bounds {
        // An object already outside is not held to the border.
        Some(b) => b.contains_rect(start) && !b.contains_rect(candidate),
        None => false,
    }
}

/// Distance from the leading edge of `rect` to the near edge of `other`.
fn gap_to(rect: &Rect, other: &Rect, axis: Axis, direction: i32) -> Fixed {
    match (axis, direction > 0) {
        (Axis::Horizontal, true) => other.x - rect.right(),
        (Axis::Horizontal, false) => rect.x - other.right(),
        (Axis::Vertical, true) => other.y - rect.bottom(),
        (Axis::Vertical, false) => rect.y - other.bottom(),
    }
}

/// Distance from the leading edge of `rect` to the border of `bounds`.
fn gap_to_border(rect: &Rect, bounds: &Rect, axis: Axis, direction: i32) -> Fixed {
    match (axis, direction > 0) {
        (Axis::Horizontal, true) => bounds.right() - rect.right(),
        (Axis::Horizontal, false) => rect.x - bounds.x,
        (Axis::Vertical, true) => bounds.bottom() - rect.bottom(),
        (Axis::Vertical, false) => rect.y - bounds.y,
    }
}

/// Move `rect` by `displacement` along one axis without entering any
/// physical obstacle or leaving the bounds.
///
/// Returns the final rectangle and whether the motion was cut short.
#[must_use]
pub fn resolve_axis(
    registry: &ObjectRegistry,
    rect: &Rect,
    exclude: Option<ObjectId>,
    axis: Axis,
    displacement: Fixed,
    config: &MotionConfig,
) -> (Rect, bool) {
    let direction = signum(displacement);
    if direction == 0 {
        return (*rect, false);
    }

    let ignore = embedded_in(registry, rect, exclude);
    let bounds = config.bounds.as_ref();
    let target = rect.translated(axis.vector(displacement));
    let swept = rect.union(&target);

    if hits(registry, &swept, exclude, &ignore).is_empty() && !leaves_bounds(bounds, rect, &target) {
        return (target, false);
    }

    let step_unit = config.step_unit.max(Fixed::DELTA);
    let mut position = *rect;
    let mut remaining = displacement.abs();

    while remaining > Fixed::ZERO {
        let step = step_unit.min(remaining);
        let next = position.translated(axis.vector(step * Fixed::from_num(direction)));
        // Test the span covered by the step, not only where it lands, so
        // an obstacle thinner than a step is still caught.
        let obstacles = hits(registry, &position.union(&next), exclude, &ignore);
        let out = leaves_bounds(bounds, rect, &next);

        if obstacles.is_empty() && !out {
            position = next;
            remaining -= step;
            continue;
        }

        // Close the sub-step gap so the mover ends flush with the obstacle.
        let mut gap = step;
        for obstacle in &obstacles {
            gap = gap.min(gap_to(&position, obstacle, axis, direction));
        }
        if out {
            if let Some(b) = bounds {
                gap = gap.min(gap_to_border(&position, b, axis, direction));
            }
        }
        if gap > Fixed::ZERO {
            position = position.translated(axis.vector(gap * Fixed::from_num(direction)));
        }
        return (position, true);
    }

    (position, false)
}

/// Resolve a full tick of motion: horizontal first, then vertical.
///
/// Any axis that was blocked has its velocity component zeroed.
#[must_use]
pub fn resolve_motion(
    registry: &ObjectRegistry,
    rect: &Rect,
    exclude: Option<ObjectId>,
    velocity: Vec2Fixed,
    config: &MotionConfig,
) -> MotionResult {
    let (after_x, blocked_x) =
        resolve_axis(registry, rect, exclude, Axis::Horizontal, velocity.x, config);
    let (after_y, blocked_y) =
        resolve_axis(registry, &after_x, exclude, Axis::Vertical, velocity.y, config);

    MotionResult {
        bounds: after_y,
        velocity: Vec2Fixed::new(
            if blocked_x { Fixed::ZERO } else { velocity.x },
            if blocked_y { Fixed::ZERO } else { velocity.y },
        ),
        blocked_x,
        blocked_y,
    }
}
