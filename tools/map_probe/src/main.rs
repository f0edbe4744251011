use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glam::{DVec3, IVec3, UVec2};
use skyview_core::events;
use skyview_core::jobs::JobSystem;
use skyview_map::config::CONFIG_FILE;
use skyview_map::{InputState, MapConfig, MapKey, NotificationPump, Viewport};
use skyview_persist::RegionWorld;
use skyview_shared::block::BlockId;
use skyview_shared::world::WorldSource;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PROBE_PLAYER: &str = "probe";
const EDIT_INTERVAL_FRAMES: u64 = 30;

struct ProbeArgs {
    world: PathBuf,
    config: Option<PathBuf>,
    frames: u64,
    screen: UVec2,
    edits: bool,
    out: Option<PathBuf>,
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();

    let Some(args) = parse_args() else {
        return;
    };

    if let Err(err) = run(args) {
        eprintln!("map_probe error: {err}");
        std::process::exit(1);
    }
}

fn parse_args() -> Option<ProbeArgs> {
    let mut parsed = ProbeArgs {
        world: PathBuf::from("world"),
        config: None,
        frames: 300,
        screen: UVec2::new(640, 480),
        edits: false,
        out: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--world" => parsed.world = PathBuf::from(expect_value(&mut args, "--world")),
            "--config" => parsed.config = Some(PathBuf::from(expect_value(&mut args, "--config"))),
            "--out" => parsed.out = Some(PathBuf::from(expect_value(&mut args, "--out"))),
            "--frames" => parsed.frames = expect_number(&mut args, "--frames"),
            "--width" => parsed.screen.x = expect_number(&mut args, "--width"),
            "--height" => parsed.screen.y = expect_number(&mut args, "--height"),
            "--edits" => parsed.edits = true,
            "--help" | "-h" => {
                println!(
                    "Usage: map_probe [--world <path>] [--config <path>] [--frames <n>] \
                     [--width <px>] [--height <px>] [--edits] [--out <png>]"
                );
                return None;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }
    Some(parsed)
}

fn expect_value(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    let Some(value) = args.next() else {
        eprintln!("{flag} expects an argument");
        std::process::exit(2);
    };
    value
}

fn expect_number<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = expect_value(args, flag);
    match value.parse::<T>() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("invalid value '{value}' for {flag}: {err}");
            std::process::exit(2);
        }
    }
}

fn load_config(args: &ProbeArgs) -> Result<MapConfig, String> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| args.world.join(CONFIG_FILE));
    match MapConfig::load(&path).map_err(|err| err.to_string())? {
        Some(config) => {
            info!("Loaded map config from {}", path.display());
            Ok(config)
        }
        None => Ok(MapConfig::default()),
    }
}

fn run(args: ProbeArgs) -> Result<(), String> {
    let config = load_config(&args)?;
    let palette = config.load_palette().map_err(|err| err.to_string())?;

    let (tx, rx) = events::channel();
    let world = RegionWorld::open(&args.world)
        .map_err(|err| format!("failed to open world {}: {err}", args.world.display()))?
        .with_events(tx);
    let world = Arc::new(world);
    let spawn = world.spawn_position();
    info!(
        "Probing world {} from spawn ({:.1}, {:.1}, {:.1})",
        world.meta().world_name.as_deref().unwrap_or("<unnamed>"),
        spawn.x,
        spawn.y,
        spawn.z
    );

    let jobs = JobSystem::new(None).map_err(|err| format!("failed to start workers: {err}"))?;
    info!("Started {} map workers", jobs.thread_count());
    let source: Arc<dyn WorldSource> = world.clone();
    let mut viewport = Viewport::new(source, palette, &config, Arc::new(jobs));
    let pump = NotificationPump::spawn(viewport.handle(), rx)
        .map_err(|err| format!("failed to start notification thread: {err}"))?;

    let frame_duration = config.frame_duration();
    let mut window_start = Instant::now();
    let mut window_frames = 0u32;
    let mut last_frame = None;

    for frame in 0..args.frames {
        let frame_start = Instant::now();

        let angle = frame as f64 * 0.05;
        world.move_player(
            PROBE_PLAYER,
            spawn + DVec3::new(angle.cos() * 24.0, 0.0, angle.sin() * 24.0),
        );
        if args.edits && frame % EDIT_INTERVAL_FRAMES == EDIT_INTERVAL_FRAMES - 1 {
            stack_block(&world, spawn, frame);
        }

        viewport.step(&scripted_input(frame, args.frames));
        let image = viewport.compose(args.screen);
        if frame + 1 == args.frames {
            last_frame = Some(image);
        }

        window_frames += 1;
        if window_start.elapsed() >= Duration::from_secs(1) {
            let fps = f64::from(window_frames) / window_start.elapsed().as_secs_f64();
            let view = viewport.view();
            info!(
                "{:.1} fps, scale {}, offset ({:.0}, {:.0})",
                fps, view.scale, view.offset.x, view.offset.y
            );
            window_start = Instant::now();
            window_frames = 0;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_duration {
            thread::sleep(frame_duration - elapsed);
        }
    }

    world.remove_player(PROBE_PLAYER);
    let handle = viewport.handle();
    info!(
        "Finished {} frames: {} chunks cached, {} rendered, {} resident, {} players tracked",
        viewport.frame(),
        handle.chunk_count(),
        handle.render_count(),
        world.resident_count(),
        handle.player_count()
    );

    if let (Some(path), Some(image)) = (&args.out, last_frame) {
        write_frame(path, &image)?;
    }

    world.close_events();
    if pump.join().is_err() {
        warn!("Notification thread panicked");
    }
    Ok(())
}

/// A fixed tour: pan east, pan south, zoom in halfway, recenter near the end.
fn scripted_input(frame: u64, total: u64) -> InputState {
    let mut input = InputState::default();
    let quarter = (total / 4).max(1);
    match frame / quarter {
        0 => input.press_key(MapKey::PanRight),
        1 => input.press_key(MapKey::PanDown),
        _ => {}
    }
    if frame == total / 2 {
        input.add_wheel_delta(1.0);
    }
    if frame == quarter * 3 {
        input.press_key(MapKey::Center);
    }
    input
}

/// Places a block on top of the spawn column, alternating materials so each
/// edit changes the visible surface.
fn stack_block(world: &RegionWorld, spawn: DVec3, frame: u64) {
    let column = spawn.floor().as_ivec3();
    let top = world.highest_non_empty_y(column.x, column.z).unwrap_or(0);
    let block = if (frame / EDIT_INTERVAL_FRAMES) % 2 == 0 {
        BlockId::SNOWCAP
    } else {
        BlockId::OBSIDIAN
    };
    match world.set_block(IVec3::new(column.x, top + 1, column.z), block) {
        Ok(Some(_)) => {}
        Ok(None) => warn!("Spawn column at ({}, {}) is outside the world", column.x, column.z),
        Err(err) => warn!("Failed to edit spawn column: {err}"),
    }
}

fn write_frame(path: &Path, image: &image::RgbaImage) -> Result<(), String> {
    image
        .save(path)
        .map_err(|err| format!("failed to write {}: {err}", path.display()))?;
    info!("Wrote last frame to {}", path.display());
    Ok(())
}
