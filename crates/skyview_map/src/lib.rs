pub mod chunk_cache;
pub mod config;
pub mod error;
pub mod handle;
pub mod input;
pub mod notifications;
pub mod palette;
pub mod players;
pub mod rasterizer;
pub mod render_cache;
pub mod viewport;

#[cfg(test)]
mod testkit;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use config::MapConfig;
pub use handle::MapHandle;
pub use input::{InputState, MapKey};
pub use notifications::NotificationPump;
pub use palette::MaterialPalette;
pub use viewport::{ViewState, Viewport};

/// Locks `mutex`, carrying on with the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
