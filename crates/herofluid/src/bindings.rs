//! Layers configuration sources onto [`FluidConfig`]: defaults, then the
//! file, then command-line flags.

use std::time::Duration;

use fluid::types::FIXED_TIME_STEP;
use fluid::{Color, FluidConfig, TimeStep};
use fluidconfig::{FluidFile, TimeStepSetting};

use crate::cli::Cli;

/// Clamp for measured frame intervals when the file does not set one.
pub const DEFAULT_MAX_TIME_STEP: Duration = Duration::from_millis(50);

pub fn apply_file(config: &mut FluidConfig, file: &FluidFile) {
    let simulation = &file.simulation;
    set(&mut config.sim_resolution, simulation.sim_resolution);
    set(&mut config.dye_resolution, simulation.dye_resolution);
    set(&mut config.density_dissipation, simulation.density_dissipation);
    set(&mut config.velocity_dissipation, simulation.velocity_dissipation);
    set(&mut config.pressure_dissipation, simulation.pressure_dissipation);
    set(&mut config.pressure_iterations, simulation.pressure_iterations);
    set(&mut config.curl, simulation.curl);
    if let Some(setting) = simulation.time_step {
        config.time_step = time_step(setting, simulation.max_time_step);
    } else if let (TimeStep::Measured { .. }, Some(max)) =
        (config.time_step, simulation.max_time_step)
    {
        config.time_step = TimeStep::Measured { max };
    }

    let splats = &file.splats;
    set(&mut config.splat_radius, splats.radius);
    set(&mut config.splat_force, splats.force);
    set(&mut config.pointer_force, splats.pointer_force);
    set(&mut config.hover_splats, splats.hover);
    if let Some(color) = splats.hover_color {
        config.hover_color = Color::from(color);
    }
    if let Some(count) = splats.ignition {
        config.ignition_splats = Some(count);
    }

    let display = &file.display;
    set(&mut config.shading, display.shading);
    set(&mut config.colorful, display.colorful);
    set(&mut config.transparent, display.transparent);
    if let Some(color) = display.back_color {
        config.back_color = Color::from(color);
    }
}

/// `file` is only consulted for the measured-step clamp, which the file may
/// set even when the CLI is what selects the measured step.
pub fn apply_cli(config: &mut FluidConfig, cli: &Cli, file: Option<&FluidFile>) {
    set(&mut config.sim_resolution, cli.sim_resolution);
    set(&mut config.dye_resolution, cli.dye_resolution);
    set(&mut config.pressure_iterations, cli.pressure_iterations);
    set(&mut config.curl, cli.curl);
    set(&mut config.splat_radius, cli.splat_radius);
    if let Some(count) = cli.ignition {
        config.ignition_splats = Some(count);
    }
    if let Some(setting) = cli.time_step {
        let max = match config.time_step {
            TimeStep::Measured { max } => Some(max),
            TimeStep::Fixed { .. } => file.and_then(|file| file.simulation.max_time_step),
        };
        config.time_step = time_step(setting, max);
    }
    if cli.opaque {
        config.transparent = false;
    }
    if let Some(color) = cli.back_color {
        config.back_color = Color::from(color);
    }
    if cli.no_shading {
        config.shading = false;
    }
}

/// Rejects combinations no single source can catch on its own.
pub fn validate(config: &FluidConfig) -> Result<(), String> {
    if config.sim_resolution == 0 || config.dye_resolution == 0 {
        return Err("grid resolutions must be greater than zero".into());
    }
    if config.splat_radius.is_nan() || config.splat_radius <= 0.0 {
        return Err(format!(
            "splat radius must be positive (got {})",
            config.splat_radius
        ));
    }
    Ok(())
}

/// The file's `max_time_step` when the layered result never reads it.
pub fn ignored_max_time_step(config: &FluidConfig, file: Option<&FluidFile>) -> Option<Duration> {
    match config.time_step {
        TimeStep::Fixed { .. } => file.and_then(|file| file.simulation.max_time_step),
        TimeStep::Measured { .. } => None,
    }
}

fn time_step(setting: TimeStepSetting, max: Option<Duration>) -> TimeStep {
    match setting {
        TimeStepSetting::Fixed => TimeStep::Fixed {
            dt: FIXED_TIME_STEP,
        },
        TimeStepSetting::Measured => TimeStep::Measured {
            max: max.unwrap_or(DEFAULT_MAX_TIME_STEP),
        },
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let file = FluidFile::from_toml_str(
            r##"
version = 1

[simulation]
sim_resolution = 64
time_step = "measured"
max_time_step = "20ms"

[splats]
hover_color = "#ff0000"
ignition = 3

[display]
transparent = false
"##,
        )
        .unwrap();

        let mut config = FluidConfig::default();
        apply_file(&mut config, &file);
        assert_eq!(config.sim_resolution, 64);
        assert_eq!(config.dye_resolution, 512);
        assert_eq!(
            config.time_step,
            TimeStep::Measured {
                max: Duration::from_millis(20)
            }
        );
        assert_eq!(config.hover_color, Color::new(1.0, 0.0, 0.0));
        assert_eq!(config.ignition_splats, Some(3));
        assert!(!config.transparent);
    }

    #[test]
    fn cli_wins_over_file() {
        let file = FluidFile::from_toml_str("version = 1\n[simulation]\ncurl = 5.0\n").unwrap();
        let cli = Cli::try_parse_from(["herofluid", "--curl", "12", "--no-shading"]).unwrap();

        let mut config = FluidConfig::default();
        apply_file(&mut config, &file);
        apply_cli(&mut config, &cli, Some(&file));
        assert_eq!(config.curl, 12.0);
        assert!(!config.shading);
    }

    #[test]
    fn measured_cli_keeps_the_file_clamp() {
        let file = FluidFile::from_toml_str(
            "version = 1\n[simulation]\ntime_step = \"measured\"\nmax_time_step = \"40ms\"\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from(["herofluid", "--time-step", "measured"]).unwrap();

        let mut config = FluidConfig::default();
        apply_file(&mut config, &file);
        apply_cli(&mut config, &cli, Some(&file));
        assert_eq!(
            config.time_step,
            TimeStep::Measured {
                max: Duration::from_millis(40)
            }
        );
    }

    #[test]
    fn clamp_without_measured_step_is_reported() {
        let file = FluidFile::from_toml_str(
            "version = 1\n[simulation]\nmax_time_step = \"20ms\"\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from(["herofluid"]).unwrap();

        let mut config = FluidConfig::default();
        apply_file(&mut config, &file);
        apply_cli(&mut config, &cli, Some(&file));
        assert_eq!(config.time_step, TimeStep::Fixed { dt: FIXED_TIME_STEP });
        assert_eq!(
            ignored_max_time_step(&config, Some(&file)),
            Some(Duration::from_millis(20))
        );
        assert_eq!(ignored_max_time_step(&config, None), None);
    }

    #[test]
    fn measured_cli_picks_up_a_clamp_the_file_set_alone() {
        let file = FluidFile::from_toml_str(
            "version = 1\n[simulation]\nmax_time_step = \"20ms\"\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from(["herofluid", "--time-step", "measured"]).unwrap();

        let mut config = FluidConfig::default();
        apply_file(&mut config, &file);
        apply_cli(&mut config, &cli, Some(&file));
        assert_eq!(
            config.time_step,
            TimeStep::Measured {
                max: Duration::from_millis(20)
            }
        );
        assert_eq!(ignored_max_time_step(&config, Some(&file)), None);
    }

    #[test]
    fn zero_radius_is_rejected() {
        let config = FluidConfig {
            splat_radius: 0.0,
            ..FluidConfig::default()
        };
        assert!(validate(&config).is_err());
        assert!(validate(&FluidConfig::default()).is_ok());
    }
}
