use std::io;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};
use skyview_core::events::EventReceiver;
use skyview_shared::world::WorldEvent;

use crate::handle::MapHandle;

/// Background thread that drains world events into a [`MapHandle`].
///
/// Events are taken in batches. Block changes in a batch are handled in
/// parallel on the map's job system; player events are applied in arrival
/// order. The thread exits once every sender is gone.
pub struct NotificationPump {
    thread: JoinHandle<()>,
}

impl NotificationPump {
    pub fn spawn(handle: MapHandle, events: EventReceiver<WorldEvent>) -> io::Result<Self> {
        let thread = thread::Builder::new()
            .name("map-notifications".to_string())
            .spawn(move || pump(&handle, &events))?;
        Ok(Self { thread })
    }

    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

fn pump(handle: &MapHandle, events: &EventReceiver<WorldEvent>) {
    let mut handled = 0usize;
    while let Ok(first) = events.recv() {
        let mut batch = vec![first];
        batch.extend(events.drain());
        handled += batch.len();
        debug!("Applying {} world events", batch.len());

        let jobs = &handle.state.jobs;
        jobs.scope(|scope| {
            for event in batch {
                match event {
                    WorldEvent::BlockChanged(change) => {
                        scope.spawn(move |_| {
                            handle.on_block_changed(change);
                        });
                    }
                    other => handle.apply(other),
                }
            }
        });
    }
    info!("World event stream closed after {} events", handled);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::{DVec3, IVec3};
    use skyview_core::events::channel;
    use skyview_core::jobs::JobSystem;
    use skyview_shared::block::BlockId;
    use skyview_shared::coords::ChunkPos;
    use skyview_shared::world::{WorldEvent, WorldSource};

    use super::NotificationPump;
    use crate::config::MapConfig;
    use crate::palette::MaterialPalette;
    use crate::testkit::{layered, MemoryWorld};
    use crate::viewport::Viewport;

    #[test]
    fn events_reach_the_map_until_the_stream_closes() {
        let mut world = MemoryWorld::new(DVec3::new(8.0, 64.0, 8.0));
        for x in 0..3 {
            for z in 0..3 {
                world = world.with_stored(ChunkPos::new(x, z), layered(BlockId::LOAM, 20));
            }
        }
        let world = Arc::new(world);
        let source: Arc<dyn WorldSource> = world.clone();
        let jobs = Arc::new(JobSystem::new(Some(2)).expect("pool"));
        let viewport = Viewport::new(source, MaterialPalette::default(), &MapConfig::default(), jobs);
        let handle = viewport.handle();
        let before = handle.rendered(ChunkPos::new(1, 2)).expect("rendered");

        let (tx, rx) = channel();
        let pump = NotificationPump::spawn(handle.clone(), rx).expect("spawn pump");

        let change = world
            .set_block(IVec3::new(20, 21, 40), BlockId::SNOWCAP)
            .expect("edit");
        tx.send(WorldEvent::BlockChanged(change)).expect("send");
        for x in [5.0, 10.0] {
            tx.send(WorldEvent::PlayerMoved {
                name: "Alice".to_string(),
                position: DVec3::new(x, 64.0, 5.0),
            })
            .expect("send");
        }
        tx.send(WorldEvent::PlayerMoved {
            name: "Bob".to_string(),
            position: DVec3::ZERO,
        })
        .expect("send");
        tx.send(WorldEvent::PlayerLeft {
            name: "Bob".to_string(),
        })
        .expect("send");
        drop(tx);
        pump.join().expect("pump thread");

        assert_eq!(handle.player("Alice"), Some(DVec3::new(10.0, 64.0, 5.0)));
        assert_eq!(handle.player("Bob"), None);
        let after = handle.rendered(ChunkPos::new(1, 2)).expect("rendered");
        assert!(after.revision > before.revision);
        assert_eq!(handle.render_count(), 9);
    }
}
