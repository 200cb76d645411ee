//! Simulation objects.
//!
//! Every entity in the simulation is a [`SimObject`]: a bounding box, a
//! closed [`ObjectKind`], and a capability set fixed at construction.
//! Handlers branch on capabilities and kinds instead of inspecting types
//! at runtime.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Rect, Vec2Fixed};

/// Unique identifier for simulation objects.
///
/// Assigned monotonically by the registry and never reused.
pub type ObjectId = u64;

/// Identifier of an input source (one per connected player).
pub type InstanceId = u32;

/// Closed set of capability tags deciding which systems act on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No capabilities.
    pub const NONE: Self = Self(0);
    /// Participates in blocking AABB collision.
    pub const PHYSICAL: Self = Self(1 << 0);
    /// Can be removed with a death transition.
    pub const KILLABLE: Self = Self(1 << 1);
    /// Has an activation transition run once when added.
    pub const SPAWNABLE: Self = Self(1 << 2);
    /// Receives a behavior update every tick.
    pub const MOVING: Self = Self(1 << 3);

    /// Whether every tag in `other` is present.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Add the tags in `other`.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove the tags in `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.with(rhs)
    }
}

/// Closed set of object variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Avatar controlled by an input source.
    Player,
    /// Static solid block.
    Block,
    /// Solid block patrolling horizontally; carries riders.
    MovingPlatform,
    /// Non-solid hazard that kills players on contact.
    DeathZone,
    /// Non-solid marker where new players appear.
    SpawnPoint,
    /// Member of the invader fleet.
    Invader,
    /// Projectile fired by a player.
    Bullet,
    /// Inert text or decoration for presentation.
    Marker,
}

impl ObjectKind {
    /// Capabilities an object of this kind gets by default.
    #[must_use]
    pub const fn default_capabilities(self) -> Capabilities {
        match self {
            Self::Player => Capabilities::KILLABLE
                .with(Capabilities::SPAWNABLE)
                .with(Capabilities::MOVING),
            Self::Block => Capabilities::PHYSICAL,
            Self::MovingPlatform => Capabilities::PHYSICAL.with(Capabilities::MOVING),
            Self::DeathZone | Self::SpawnPoint | Self::Marker => Capabilities::NONE,
            Self::Invader => Capabilities::KILLABLE.with(Capabilities::MOVING),
            Self::Bullet => Capabilities::KILLABLE
                .with(Capabilities::SPAWNABLE)
                .with(Capabilities::MOVING),
        }
    }

    /// Default bounding size (width, height) in whole units.
    #[must_use]
    pub const fn default_size(self) -> (i32, i32) {
        match self {
            Self::Player => (30, 40),
            Self::Block => (50, 50),
            Self::MovingPlatform => (50, 10),
            Self::DeathZone => (100, 100),
            Self::SpawnPoint => (1, 1),
            Self::Invader => (40, 20),
            Self::Bullet => (10, 10),
            Self::Marker => (200, 30),
        }
    }
}

/// Directional and action inputs currently held by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HeldInput {
    /// Left is held.
    pub left: bool,
    /// Right is held.
    pub right: bool,
    /// Action (jump / fire) is held.
    pub action: bool,
}

impl HeldInput {
    /// Horizontal direction implied by the held keys: -1, 0 or 1.
    #[must_use]
    pub const fn direction(&self) -> i32 {
        let mut dir = 0;
        if self.left {
            dir -= 1;
        }
        if self.right {
            dir += 1;
        }
        dir
    }
}

/// Free-form state owned by an object's behavior policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BehaviorState {
    /// Per-tick displacement applied by the last behavior update.
    pub velocity: Vec2Fixed,
    /// Current heading along the object's primary axis (-1, 0, 1).
    pub direction: i32,
    /// Movement speed in units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Inputs held by the controlling source.
    pub input: HeldInput,
    /// Set by the activation transition, cleared by the kill transition.
    pub alive: bool,
    /// Named tick counters (turn times, cooldowns), ordered for hashing.
    pub timers: BTreeMap<String, i64>,
}

impl BehaviorState {
    /// Read a named timer.
    #[must_use]
    pub fn timer(&self, name: &str) -> Option<i64> {
        self.timers.get(name).copied()
    }

    /// Set a named timer.
    pub fn set_timer(&mut self, name: &str, value: i64) {
        self.timers.insert(name.to_string(), value);
    }
}

/// A live simulation entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimObject {
    /// Registry identity. Zero until the object is registered.
    pub id: ObjectId,
    /// Object that spawned this one (a bullet's shooter).
    pub owner: Option<ObjectId>,
    /// Input source controlling this object, for players.
    pub source: Option<InstanceId>,
    /// Bounding box in world space.
    pub bounds: Rect,
    /// Variant tag.
    pub kind: ObjectKind,
    /// Capability tags.
    pub caps: Capabilities,
    /// Behavior-owned state.
    pub state: BehaviorState,
    /// Text shown by presentation layers for markers.
    pub label: Option<String>,
}

impl SimObject {
    /// Create an unregistered object of `kind` at `(x, y)` with the kind's
    /// default size and capabilities.
    #[must_use]
    pub fn new(kind: ObjectKind, x: Fixed, y: Fixed) -> Self {
        let (w, h) = kind.default_size();
        Self {
            id: 0,
            owner: None,
            source: None,
            bounds: Rect::new(x, y, Fixed::from_num(w), Fixed::from_num(h)),
            kind,
            caps: kind.default_capabilities(),
            state: BehaviorState::default(),
            label: None,
        }
    }

    /// Same as [`SimObject::new`] with whole-number coordinates.
    #[must_use]
    pub fn at(kind: ObjectKind, x: i32, y: i32) -> Self {
        Self::new(kind, Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Player avatar for an input source.
    #[must_use]
    pub fn player(source: InstanceId, x: Fixed, y: Fixed) -> Self {
        Self::new(ObjectKind::Player, x, y)
            .with_source(source)
            .with_speed(Fixed::from_num(5))
    }

    /// Horizontally patrolling platform.
    #[must_use]
    pub fn moving_platform(x: i32, y: i32) -> Self {
        Self::at(ObjectKind::MovingPlatform, x, y)
            .with_speed(Fixed::from_num(4))
            .with_direction(1)
    }

    /// Bullet owned by `owner`, travelling upward.
    #[must_use]
    pub fn bullet(owner: ObjectId, source: Option<InstanceId>, x: Fixed, y: Fixed) -> Self {
        let mut bullet = Self::new(ObjectKind::Bullet, x, y)
            .with_speed(Fixed::from_num(10))
            .with_direction(-1);
        bullet.owner = Some(owner);
        bullet.source = source;
        bullet
    }

    /// Text marker.
    #[must_use]
    pub fn marker(text: impl Into<String>, x: i32, y: i32) -> Self {
        Self::at(ObjectKind::Marker, x, y).with_label(text)
    }

    /// Set the controlling input source.
    #[must_use]
    pub fn with_source(mut self, source: InstanceId) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the movement speed.
    #[must_use]
    pub fn with_speed(mut self, speed: Fixed) -> Self {
        self.state.speed = speed;
        self
    }

    /// Set the initial heading.
    #[must_use]
    pub fn with_direction(mut self, direction: i32) -> Self {
        self.state.direction = direction;
        self
    }

    /// Override the bounding size.
    #[must_use]
    pub fn with_size(mut self, width: Fixed, height: Fixed) -> Self {
        self.bounds.width = width;
        self.bounds.height = height;
        self
    }

    /// Override the capability set.
    #[must_use]
    pub fn with_caps(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Attach a text label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether the object has every tag in `caps`.
    #[must_use]
    pub const fn has(&self, caps: Capabilities) -> bool {
        self.caps.contains(caps)
    }

    /// Whether the object blocks motion.
    #[must_use]
    pub const fn is_physical(&self) -> bool {
        self.caps.contains(Capabilities::PHYSICAL)
    }

    /// Activation transition, run once when a `SPAWNABLE` object enters the
    /// registry.
    pub fn activate(&mut self) {
        self.state.alive = true;
    }

    /// Kill transition, run once before a `KILLABLE` object is removed.
    pub fn kill(&mut self) {
        self.state.alive = false;
        self.state.velocity = Vec2Fixed::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_resolved_from_kind() {
        let block = SimObject::at(ObjectKind::Block, 0, 0);
        assert!(block.is_physical());
        assert!(!block.has(Capabilities::KILLABLE));

        let zone = SimObject::at(ObjectKind::DeathZone, 0, 0);
        assert!(!zone.is_physical());

        let player = SimObject::player(1, Fixed::ZERO, Fixed::ZERO);
        assert!(player.has(Capabilities::KILLABLE | Capabilities::SPAWNABLE));
        assert_eq!(player.source, Some(1));
        assert_eq!(player.bounds.width, Fixed::from_num(30));
    }

    #[test]
    fn test_caps_override() {
        let ghost = SimObject::at(ObjectKind::Block, 0, 0).with_caps(Capabilities::NONE);
        assert!(!ghost.is_physical());
        let caps = Capabilities::PHYSICAL.with(Capabilities::MOVING);
        assert!(caps.without(Capabilities::MOVING).contains(Capabilities::PHYSICAL));
        assert!(!caps.without(Capabilities::MOVING).contains(Capabilities::MOVING));
    }

    #[test]
    fn test_held_input_direction() {
        let mut held = HeldInput::default();
        assert_eq!(held.direction(), 0);
        held.left = true;
        assert_eq!(held.direction(), -1);
        held.right = true;
        assert_eq!(held.direction(), 0);
        held.left = false;
        assert_eq!(held.direction(), 1);
    }

    #[test]
    fn test_activate_and_kill() {
        let mut bullet = SimObject::bullet(3, None, Fixed::ZERO, Fixed::ZERO);
        assert_eq!(bullet.owner, Some(3));
        bullet.activate();
        assert!(bullet.state.alive);
        bullet.kill();
        assert!(!bullet.state.alive);
    }

    #[test]
    fn test_timers() {
        let mut state = BehaviorState::default();
        assert_eq!(state.timer("turn"), None);
        state.set_timer("turn", 42);
        assert_eq!(state.timer("turn"), Some(42));
    }
}
