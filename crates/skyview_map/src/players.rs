use std::sync::Mutex;

use glam::DVec3;
use rustc_hash::FxHashMap;

use crate::lock;

/// Last reported position of every player currently on the map.
#[derive(Debug, Default)]
pub struct PlayerTracker {
    players: Mutex<FxHashMap<String, DVec3>>,
}

impl PlayerTracker {
    pub fn set_position(&self, name: &str, position: DVec3) {
        let mut players = lock(&self.players);
        match players.get_mut(name) {
            Some(existing) => *existing = position,
            None => {
                players.insert(name.to_string(), position);
            }
        }
    }

    pub fn remove(&self, name: &str) -> Option<DVec3> {
        lock(&self.players).remove(name)
    }

    pub fn get(&self, name: &str) -> Option<DVec3> {
        lock(&self.players).get(name).copied()
    }

    pub fn len(&self) -> usize {
        lock(&self.players).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.players).is_empty()
    }

    pub fn snapshot(&self) -> Vec<(String, DVec3)> {
        lock(&self.players)
            .iter()
            .map(|(name, position)| (name.clone(), *position))
            .collect()
    }
}
