use std::path::PathBuf;

use clap::Parser;
use fluidconfig::{parse_hex_color, TimeStepSetting};

#[derive(Parser, Debug)]
#[command(
    name = "herofluid",
    author,
    version,
    about = "Stable-fluids hero background"
)]
pub struct Cli {
    /// Configuration file; defaults to `herofluid.toml` in the user config directory.
    #[arg(long, env = "HEROFLUID_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Window or framebuffer size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Shorter-axis resolution of the velocity grid.
    #[arg(long, value_name = "CELLS")]
    pub sim_resolution: Option<u32>,

    /// Shorter-axis resolution of the dye grid.
    #[arg(long, value_name = "TEXELS")]
    pub dye_resolution: Option<u32>,

    /// Jacobi iterations per pressure solve.
    #[arg(long, value_name = "COUNT")]
    pub pressure_iterations: Option<u32>,

    /// Vorticity confinement strength.
    #[arg(long, value_name = "STRENGTH")]
    pub curl: Option<f32>,

    /// Splat radius in percent of the canvas.
    #[arg(long, value_name = "PERCENT")]
    pub splat_radius: Option<f32>,

    /// Random splats fired on the first frame (default: 5-24).
    #[arg(long, value_name = "COUNT")]
    pub ignition: Option<u32>,

    /// `fixed` (1/60 s per frame) or `measured` (real frame interval).
    #[arg(long, value_name = "MODE", value_parser = parse_time_step)]
    pub time_step: Option<TimeStepSetting>,

    /// Composite over `--back-color` instead of rendering a transparent surface.
    #[arg(long)]
    pub opaque: bool,

    /// Background colour for opaque mode (`#rrggbb`).
    #[arg(long, value_name = "HEX", value_parser = parse_back_color)]
    pub back_color: Option<[f32; 3]>,

    /// Disable the lighting pass in the compositor.
    #[arg(long)]
    pub no_shading: bool,

    /// Seed for splat positions and colours.
    #[arg(long, env = "HEROFLUID_SEED", value_name = "SEED")]
    pub seed: Option<u64>,

    /// Run this many frames on the CPU renderer without opening a window, then exit.
    #[arg(long, value_name = "FRAMES")]
    pub headless_frames: Option<u32>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{value}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|err| format!("invalid width '{width}': {err}"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|err| format!("invalid height '{height}': {err}"))?;
    if width == 0 || height == 0 {
        return Err("size must be non-zero".to_string());
    }
    Ok((width, height))
}

fn parse_time_step(value: &str) -> Result<TimeStepSetting, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "fixed" => Ok(TimeStepSetting::Fixed),
        "measured" => Ok(TimeStepSetting::Measured),
        other => Err(format!(
            "unknown time step '{other}'; expected 'fixed' or 'measured'"
        )),
    }
}

fn parse_back_color(value: &str) -> Result<[f32; 3], String> {
    parse_hex_color(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_surface_sizes() {
        assert_eq!(parse_surface_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_surface_size("64X32").unwrap(), (64, 32));
        assert!(parse_surface_size("0x10").is_err());
        assert!(parse_surface_size("wide").is_err());
    }

    #[test]
    fn parses_time_step_modes() {
        assert_eq!(parse_time_step("Fixed").unwrap(), TimeStepSetting::Fixed);
        assert_eq!(parse_time_step("measured").unwrap(), TimeStepSetting::Measured);
        assert!(parse_time_step("variable").is_err());
    }

    #[test]
    fn cli_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "herofluid",
            "--size",
            "320x200",
            "--opaque",
            "--back-color",
            "#ff0000",
            "--headless-frames",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.size, Some((320, 200)));
        assert!(cli.opaque);
        assert_eq!(cli.back_color, Some([1.0, 0.0, 0.0]));
        assert_eq!(cli.headless_frames, Some(3));
    }
}
