use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wheelie_common::RunId;
use wheelie_input::ControlIntent;
use wheelie_session::{
    GameOverCause, GameSession, MemoryHighScore, SessionConfig, SessionEvent, SessionSnapshot,
};

#[derive(Parser)]
#[command(name = "wheelie-cli", about = "Headless driver for the wheelie course")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML session configuration; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective configuration summary
    Info,
    /// Ride the course on autopilot until the time runs out or the bike crashes
    Run {
        /// Simulated seconds to ride
        #[arg(short, long, default_value = "30")]
        seconds: f32,
        /// Presentation frames per second
        #[arg(long, default_value = "60")]
        fps: u32,
        /// Override the course seed
        #[arg(long)]
        seed: Option<u64>,
        /// Seconds the wheelie is held in each autopilot cycle
        #[arg(long, default_value = "1.0")]
        hold: f32,
        /// Seconds the wheelie is released in each autopilot cycle
        #[arg(long, default_value = "2.0")]
        release: f32,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ride the same script at two frame rates and compare the outcome
    Determinism {
        #[arg(short, long, default_value = "10")]
        seconds: f32,
        #[arg(long, default_value = "30")]
        slow_fps: u32,
        #[arg(long, default_value = "120")]
        fast_fps: u32,
    },
    /// Print the effective configuration as YAML
    Config,
}

/// Throttle always, wheelie on a fixed duty cycle.
#[derive(Debug, Clone, Copy)]
struct Autopilot {
    hold: f32,
    release: f32,
}

impl Autopilot {
    fn intent(&self, elapsed: f32) -> ControlIntent {
        let cycle = self.hold + self.release;
        let wheelie = cycle > 0.0 && elapsed.rem_euclid(cycle) < self.hold;
        ControlIntent::throttle().with_wheelie(wheelie)
    }
}

#[derive(Debug, Serialize)]
struct RunSummary {
    run: Option<RunId>,
    frames: u64,
    steps: u64,
    distance: f32,
    ended: Option<GameOverCause>,
    spawned: usize,
    retired: usize,
    wheelies: usize,
    new_high_score: bool,
    snapshot: SessionSnapshot,
}

#[derive(Debug, PartialEq)]
struct RideOutcome {
    steps: u64,
    z: f32,
    speed: f32,
    wheelie_angle: f32,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

fn ride(
    config: &SessionConfig,
    seconds: f32,
    fps: u32,
    pilot: Autopilot,
) -> anyhow::Result<(GameSession, RunSummary)> {
    if fps == 0 {
        bail!("fps must be at least 1");
    }
    let mut session = GameSession::new(config, Box::new(MemoryHighScore::default()))?;
    session.start_game()?;
    let run = session.run();

    let dt = 1.0 / fps as f32;
    let frames = (seconds * fps as f32).round() as u64;
    let mut summary = RunSummary {
        run,
        frames: 0,
        steps: 0,
        distance: 0.0,
        ended: None,
        spawned: 0,
        retired: 0,
        wheelies: 0,
        new_high_score: false,
        snapshot: session.snapshot(),
    };
    for frame in 0..frames {
        session.set_control_intent(pilot.intent(frame as f32 * dt));
        let report = session.frame(dt);
        summary.frames += 1;
        summary.steps += u64::from(report.steps);
        summary.spawned += report.delta.spawned.len();
        summary.retired += report.delta.retired.len();
        for event in session.drain_events() {
            match event {
                SessionEvent::WheelieStarted => summary.wheelies += 1,
                SessionEvent::NewHighScore(_) => summary.new_high_score = true,
                SessionEvent::GameOver { .. } | SessionEvent::WheelieEnded => {}
            }
        }
        if frame % u64::from(fps) == 0 {
            tracing::info!("{}", session.snapshot());
        }
        if report.game_over.is_some() {
            summary.ended = report.game_over;
            break;
        }
    }
    summary.distance = session.dynamics().forward_z();
    summary.snapshot = session.snapshot();
    Ok((session, summary))
}

fn outcome(session: &GameSession) -> anyhow::Result<RideOutcome> {
    let vehicle = session
        .dynamics()
        .vehicle()
        .context("session has no bike attached")?;
    Ok(RideOutcome {
        steps: session.clock().total_steps(),
        z: vehicle.position.z,
        speed: vehicle.speed,
        wheelie_angle: vehicle.wheelie_angle,
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Info => {
            println!("wheelie-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("seed: {}", config.seed);
            println!("fixed dt: {} s", config.fixed_dt);
            println!(
                "vehicle: max speed {} m/s, max wheelie {}°, crash roll {}°",
                config.vehicle.max_speed,
                config.vehicle.max_wheelie_angle,
                config.vehicle.roll_crash_threshold
            );
            println!(
                "stream: segments {} m, window -{} / +{} m, obstacle chance {}",
                config.stream.segment_length,
                config.stream.trailing_window,
                config.stream.leading_window,
                config.stream.obstacle_spawn_chance
            );
        }
        Commands::Run {
            seconds,
            fps,
            seed,
            hold,
            release,
            json,
        } => {
            if let Some(seed) = seed {
                config.seed = seed;
            }
            let (_, summary) = ride(&config, seconds, fps, Autopilot { hold, release })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Run {}: {} frames, {} steps, {:.1} m",
                    summary.run.map(|r| r.to_string()).unwrap_or_default(),
                    summary.frames,
                    summary.steps,
                    summary.distance
                );
                println!(
                    "Course: spawned {}, retired {}; wheelies: {}",
                    summary.spawned, summary.retired, summary.wheelies
                );
                match summary.ended {
                    Some(cause) => println!("Ended: {cause}"),
                    None => println!("Ended: time up"),
                }
                println!("{}", summary.snapshot);
            }
        }
        Commands::Determinism {
            seconds,
            slow_fps,
            fast_fps,
        } => {
            // Switch the wheelie on whole seconds so both frame rates change
            // intent on the same fixed step. Collisions are only checked once
            // per frame, so obstacles are left out of the comparison.
            config.stream.obstacle_kinds.clear();
            let pilot = Autopilot {
                hold: 1.0,
                release: 1.0,
            };
            let (slow, _) = ride(&config, seconds, slow_fps, pilot)?;
            let (fast, _) = ride(&config, seconds, fast_fps, pilot)?;
            let a = outcome(&slow)?;
            let b = outcome(&fast)?;
            println!(
                "{slow_fps} fps: steps={}, z={:.3}, speed={:.3}, wheelie={:.3}",
                a.steps, a.z, a.speed, a.wheelie_angle
            );
            println!(
                "{fast_fps} fps: steps={}, z={:.3}, speed={:.3}, wheelie={:.3}",
                b.steps, b.z, b.speed, b.wheelie_angle
            );
            if a != b {
                bail!("MISMATCH between {slow_fps} fps and {fast_fps} fps");
            }
            println!("Match: OK");
        }
        Commands::Config => {
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}
