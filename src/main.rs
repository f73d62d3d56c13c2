//! Ballpit headless runner
//!
//! Plays a short scripted session and prints the final snapshot as JSON.
//! Usage: `ballpit [seed] [easy|normal|hard]`

use ballpit::sim::{GameEvent, InputCommand, Simulation, Snapshot};
use ballpit::sim::geometry::Rect;
use ballpit::consts::DRAIN_ZONE_SIZE;
use ballpit::{Difficulty, SimConfig};

const WIDTH: f32 = 800.0;
const HEIGHT: f32 = 600.0;
const FRAME_DT: f32 = 1.0 / 60.0;
const FRAMES: u32 = 60 * 30;

/// Scripted input for a frame: a pop, then a suction/eject cycle
fn script(frame: u32, last: &Snapshot) -> Vec<InputCommand> {
    match frame {
        f if f % 90 == 45 => last
            .balls
            .first()
            .map(|b| vec![InputCommand::PopAt { x: b.x, y: b.y }])
            .unwrap_or_default(),
        600 => vec![InputCommand::SuctionStart {
            x: WIDTH / 2.0,
            y: HEIGHT / 2.0,
        }],
        720 => vec![InputCommand::SuctionStop],
        721..=725 => vec![InputCommand::Eject {
            x: WIDTH / 4.0,
            y: HEIGHT / 2.0,
        }],
        900 => vec![InputCommand::AddBall {
            x: WIDTH / 2.0,
            y: HEIGHT - 50.0,
        }],
        _ => Vec::new(),
    }
}

fn run(seed: u64, preset: Difficulty) -> Result<Snapshot, Box<dyn std::error::Error>> {
    let mut config = SimConfig::from_preset(preset);
    config.seed = seed;
    config.drain_zone = Some(Rect::new(
        WIDTH - DRAIN_ZONE_SIZE,
        0.0,
        DRAIN_ZONE_SIZE,
        DRAIN_ZONE_SIZE,
    ));

    let mut sim = Simulation::new();
    sim.start(WIDTH, HEIGHT, config)?;
    log::info!("Game initialized with seed: {} ({})", seed, preset.as_str());

    let mut last = sim.snapshot();
    for frame in 0..FRAMES {
        let commands = script(frame, &last);
        last = sim.step(FRAME_DT, &commands)?;
        for event in &last.events {
            match event {
                GameEvent::Popped { id, value } => log::info!("Popped ball {id} (+{value})"),
                GameEvent::Drained { id } => log::info!("Ball {id} drained"),
                GameEvent::Ended { reason } => log::info!("Game over: {reason:?}"),
                other => log::debug!("{other:?}"),
            }
        }
        if last.end_reason.is_some() {
            break;
        }
    }
    Ok(last)
}

fn main() {
    env_logger::init();
    log::info!("Ballpit (headless) starting...");

    let mut args = std::env::args().skip(1);
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(12345);
    let preset = args
        .next()
        .and_then(|s| Difficulty::from_str(&s))
        .unwrap_or_default();

    match run(seed, preset) {
        Ok(snapshot) => match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("Failed to encode snapshot: {e}"),
        },
        Err(e) => {
            log::error!("Simulation failed: {e}");
            std::process::exit(1);
        }
    }
}
