use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use fluid::frame::FrameStatus;
use fluid::{FluidConfig, FluidSimulation, FrameLoop, SoftwareBackend, WindowOptions};
use fluidconfig::FluidFile;
use tracing_subscriber::EnvFilter;

use crate::bindings;
use crate::cli::Cli;
use crate::paths::AppPaths;

const DEFAULT_SIZE: (u32, u32) = (1280, 720);

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let size = cli.size.unwrap_or(DEFAULT_SIZE);

    match cli.headless_frames {
        Some(frames) => run_headless(config, size, frames, cli.seed),
        None => fluid::run_window(WindowOptions {
            title: "herofluid".to_string(),
            size,
            config,
            seed: cli.seed,
        }),
    }
}

/// Defaults, then the config file (explicit or discovered), then CLI flags.
fn resolve_config(cli: &Cli) -> Result<FluidConfig> {
    let mut config = FluidConfig::default();

    let file = match &cli.config {
        Some(path) => Some(load_file(path)?),
        None => {
            let paths = AppPaths::discover()?;
            let path = paths.config_file();
            if path.exists() {
                Some(load_file(&path)?)
            } else {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                None
            }
        }
    };
    if let Some(file) = &file {
        bindings::apply_file(&mut config, file);
    }

    bindings::apply_cli(&mut config, cli, file.as_ref());
    if let Some(max) = bindings::ignored_max_time_step(&config, file.as_ref()) {
        tracing::warn!(
            max_time_step = ?max,
            "max_time_step only applies with time_step = \"measured\"; ignoring it"
        );
    }
    bindings::validate(&config).map_err(|err| anyhow!("invalid configuration: {err}"))?;
    Ok(config)
}

fn load_file(path: &Path) -> Result<FluidFile> {
    let file = FluidFile::from_path(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded configuration");
    Ok(file)
}

fn run_headless(config: FluidConfig, size: (u32, u32), frames: u32, seed: Option<u64>) -> Result<()> {
    let backend = SoftwareBackend::new(size.0, size.1);
    let time_step = config.time_step;
    let mut simulation = match seed {
        Some(seed) => FluidSimulation::with_seed(backend, config, seed),
        None => FluidSimulation::new(backend, config),
    };
    let mut frame_loop = FrameLoop::new(time_step);
    frame_loop
        .start(&mut simulation)
        .context("failed to start the simulation")?;

    let started = Instant::now();
    let mut skipped = 0u32;
    for _ in 0..frames {
        match frame_loop.tick(&mut simulation, Instant::now())? {
            FrameStatus::Skipped => skipped += 1,
            FrameStatus::Stopped => break,
            FrameStatus::Presented | FrameStatus::Idle => {}
        }
    }

    let energy = simulation
        .dye_energy()
        .context("failed to read back the dye field")?;
    tracing::info!(
        frames = frame_loop.frames(),
        skipped,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "headless run finished"
    );
    println!(
        "rendered {} frames at {}x{}; dye energy {energy:.6}",
        frame_loop.frames(),
        size.0,
        size.1
    );
    Ok(())
}
