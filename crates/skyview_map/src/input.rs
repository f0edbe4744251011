use rustc_hash::FxHashSet;

/// Map controls the display surface forwards each frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    PanUp,
    PanDown,
    PanLeft,
    PanRight,
    Center,
    Refresh,
}

#[derive(Debug, Default, Clone)]
pub struct InputState {
    pressed_keys: FxHashSet<MapKey>,
    /// Vertical wheel movement since the last frame; positive zooms in.
    pub wheel_delta: f64,
}

impl InputState {
    pub fn press_key(&mut self, key: MapKey) {
        self.pressed_keys.insert(key);
    }

    pub fn release_key(&mut self, key: MapKey) {
        self.pressed_keys.remove(&key);
    }

    pub fn is_pressed(&self, key: MapKey) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn add_wheel_delta(&mut self, delta: f64) {
        self.wheel_delta += delta;
    }

    /// Forgets per-frame motion; held keys stay held.
    pub fn clear_frame(&mut self) {
        self.wheel_delta = 0.0;
    }
}
