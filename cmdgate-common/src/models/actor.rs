// File: cmdgate-common/src/models/actor.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of entity issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    /// A connected player. The only kind subject to cost, cooldown and warmup.
    Player,
    Console,
    /// Command blocks, schedulers, other plugins.
    Automation,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::Player => "player",
            ActorKind::Console => "console",
            ActorKind::Automation => "automation",
        }
    }
}

/// A point in the world, used to decide whether movement should cancel a warmup.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// An entity capable of issuing commands.
///
/// Console and automation actors get a fixed id so they can still be addressed
/// by the messenger, but they are never gated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub kind: ActorKind,
}

impl Actor {
    pub fn player(id: Uuid, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: ActorKind::Player,
        }
    }

    pub fn console() -> Self {
        Self {
            id: Uuid::nil(),
            name: "CONSOLE".to_string(),
            kind: ActorKind::Console,
        }
    }

    pub fn automation(name: &str) -> Self {
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
            name: name.to_string(),
            kind: ActorKind::Automation,
        }
    }

    /// Whether cooldown, cost and warmup apply to this actor at all.
    pub fn is_gated(&self) -> bool {
        self.kind == ActorKind::Player
    }
}
