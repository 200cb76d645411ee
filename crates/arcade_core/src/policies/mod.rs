//! Reference game policies.
//!
//! A policy set is a group of [`Behavior`](crate::behavior::Behavior)s and
//! [`EventHandler`](crate::dispatch::EventHandler)s plugged into a
//! [`GameInstance`]. The engine knows nothing about either game; both are
//! installed through the same registries a third game would use.

pub mod invaders;
pub mod platformer;

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorRegistry;
use crate::config::EngineConfig;
use crate::dispatch::HandlerRegistry;
use crate::error::Result;
use crate::event::EventType;
use crate::instance::GameInstance;
use crate::object::{ObjectKind, SimObject};

/// Built-in policy sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Game {
    /// Side-on platformer with gravity, moving platforms and death zones.
    Platformer,
    /// Fixed shooter against a marching fleet.
    Invaders,
}

impl Game {
    /// Install this game's behaviors and handlers. Handlers are added after
    /// the core ones, so they see the core death transition already applied.
    pub fn install(self, behaviors: &mut BehaviorRegistry, handlers: &mut HandlerRegistry) {
        match self {
            Self::Platformer => {
                behaviors.register(ObjectKind::Player, Box::new(platformer::PlayerBehavior));
                behaviors.register(
                    ObjectKind::MovingPlatform,
                    Box::new(platformer::MovingPlatformBehavior),
                );
                handlers.register(EventType::Collision, Box::new(platformer::CollisionHandler));
                handlers.register(EventType::Death, Box::new(platformer::RespawnHandler));
            }
            Self::Invaders => {
                behaviors.register(ObjectKind::Player, Box::new(invaders::ShooterBehavior));
                behaviors.register(ObjectKind::Invader, Box::new(invaders::FleetBehavior));
                behaviors.register(ObjectKind::Bullet, Box::new(invaders::BulletBehavior));
                handlers.register(EventType::Collision, Box::new(invaders::CollisionHandler));
                handlers.register(EventType::Death, Box::new(invaders::DeathHandler));
            }
        }
    }

    /// A [`GameInstance`] with this game's policies and an empty world.
    ///
    /// # Errors
    /// Returns an error if `config` fails validation.
    pub fn instance(self, config: EngineConfig) -> Result<GameInstance> {
        let mut game = GameInstance::new(config)?;
        let (behaviors, handlers) = game.policies_mut();
        self.install(behaviors, handlers);
        Ok(game)
    }

    /// A [`GameInstance`] with this game's policies and its default scene.
    ///
    /// # Errors
    /// Returns an error if `config` fails validation.
    pub fn with_scene(self, config: EngineConfig) -> Result<GameInstance> {
        let mut game = self.instance(config)?;
        for object in self.default_scene() {
            game.add_object(object)?;
        }
        Ok(game)
    }

    /// Starting level, without players. Players join through
    /// [`GameInstance::join`].
    #[must_use]
    pub fn default_scene(self) -> Vec<SimObject> {
        match self {
            Self::Platformer => platformer_scene(),
            Self::Invaders => invaders_scene(),
        }
    }
}

impl std::fmt::Display for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Platformer => write!(f, "platformer"),
            Self::Invaders => write!(f, "invaders"),
        }
    }
}

impl std::str::FromStr for Game {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "platformer" => Ok(Self::Platformer),
            "invaders" => Ok(Self::Invaders),
            other => Err(format!("unknown game '{other}'")),
        }
    }
}

fn platformer_scene() -> Vec<SimObject> {
    let mut scene: Vec<SimObject> = (0..16)
        .map(|i| SimObject::at(ObjectKind::Block, i * 50, 750))
        .collect();
    scene.push(SimObject::at(ObjectKind::Block, 250, 600));
    scene.push(SimObject::at(ObjectKind::Block, 300, 600));
    scene.push(SimObject::moving_platform(400, 500));
    scene.push(SimObject::at(ObjectKind::DeathZone, 650, 650));
    scene.push(SimObject::at(ObjectKind::SpawnPoint, 120, 100));
    scene.push(SimObject::at(ObjectKind::SpawnPoint, 200, 100));
    scene
}

fn invaders_scene() -> Vec<SimObject> {
    let mut scene = Vec::with_capacity(25);
    for row in 0..3 {
        for column in 0..8 {
            scene.push(
                SimObject::at(ObjectKind::Invader, 100 + 60 * column, 60 + 40 * row)
                    .with_direction(1),
            );
        }
    }
    scene.push(SimObject::at(ObjectKind::SpawnPoint, 385, 740));
    scene
}
