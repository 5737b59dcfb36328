// File: cmdgate-server/src/players.rs
//! Who is online and where they stand.

use dashmap::DashMap;
use uuid::Uuid;

use cmdgate_common::models::{Actor, Position};

use crate::demo_commands::SPAWN;

#[derive(Debug, Clone)]
struct PlayerState {
    actor: Actor,
    position: Position,
    online: bool,
}

#[derive(Default)]
pub struct PlayerDirectory {
    by_name: DashMap<String, PlayerState>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the player, creating it at spawn on first sight. `true` if new.
    pub fn join(&self, name: &str) -> (Actor, bool) {
        let key = name.to_lowercase();
        let mut created = false;
        let mut state = self.by_name.entry(key).or_insert_with(|| {
            created = true;
            PlayerState {
                actor: Actor::player(Uuid::new_v4(), name),
                position: SPAWN,
                online: true,
            }
        });
        state.online = true;
        (state.actor.clone(), created)
    }

    pub fn find(&self, name: &str) -> Option<Actor> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|s| s.actor.clone())
    }

    pub fn position(&self, actor_id: Uuid) -> Option<Position> {
        self.by_name
            .iter()
            .find(|s| s.actor.id == actor_id && s.online)
            .map(|s| s.position)
    }

    /// Moves an online player and returns the old position.
    pub fn move_to(&self, name: &str, to: Position) -> Option<(Actor, Position)> {
        let mut state = self.by_name.get_mut(&name.to_lowercase())?;
        if !state.online {
            return None;
        }
        let from = state.position;
        state.position = to;
        Some((state.actor.clone(), from))
    }

    pub fn teleport(&self, actor_id: Uuid, to: Position) -> bool {
        match self
            .by_name
            .iter_mut()
            .find(|s| s.actor.id == actor_id && s.online)
        {
            Some(mut state) => {
                state.position = to;
                true
            }
            None => false,
        }
    }

    pub fn disconnect(&self, name: &str) -> Option<Actor> {
        let mut state = self.by_name.get_mut(&name.to_lowercase())?;
        state.online = false;
        Some(state.actor.clone())
    }

    pub fn online(&self) -> Vec<Actor> {
        self.by_name
            .iter()
            .filter(|s| s.online)
            .map(|s| s.actor.clone())
            .collect()
    }
}
