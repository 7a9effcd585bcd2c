use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How the simulation advances its clock each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeStepSetting {
    /// Always step by 1/60 s, regardless of the real frame interval.
    Fixed,
    /// Step by the measured frame interval, clamped to `max_time_step`.
    Measured,
}

/// On-disk configuration file.
///
/// Every key is optional; unset values fall back to the simulation defaults
/// when the binary layers the file over them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FluidFile {
    pub version: u32,
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub splats: SplatSection,
    #[serde(default)]
    pub display: DisplaySection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulationSection {
    pub sim_resolution: Option<u32>,
    pub dye_resolution: Option<u32>,
    pub density_dissipation: Option<f32>,
    pub velocity_dissipation: Option<f32>,
    pub pressure_dissipation: Option<f32>,
    pub pressure_iterations: Option<u32>,
    pub curl: Option<f32>,
    pub time_step: Option<TimeStepSetting>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_time_step: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SplatSection {
    pub radius: Option<f32>,
    pub force: Option<f32>,
    pub ignition: Option<u32>,
    pub pointer_force: Option<f32>,
    pub hover: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_color_opt")]
    pub hover_color: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DisplaySection {
    pub shading: Option<bool>,
    pub colorful: Option<bool>,
    pub transparent: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_color_opt")]
    pub back_color: Option<[f32; 3]>,
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_color_opt<'de, D>(deserializer: D) -> Result<Option<[f32; 3]>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Hex(String),
        Rgb([f32; 3]),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    match helper {
        None => Ok(None),
        Some(Helper::Rgb(rgb)) => Ok(Some(rgb)),
        Some(Helper::Hex(raw)) => parse_hex_color(&raw).map(Some).map_err(de::Error::custom),
    }
}

/// Parses `#rrggbb` (leading `#` optional) into linear 0..1 channels.
pub fn parse_hex_color(raw: &str) -> Result<[f32; 3], String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(format!("invalid color '{trimmed}'; expected #rrggbb"));
    }
    let mut rgb = [0.0; 3];
    for (index, channel) in rgb.iter_mut().enumerate() {
        let byte = u8::from_str_radix(&digits[index * 2..index * 2 + 2], 16)
            .map_err(|err| format!("invalid color '{trimmed}': {err}"))?;
        *channel = byte as f32 / 255.0;
    }
    Ok(rgb)
}

impl FluidFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FluidFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let simulation = &self.simulation;
        for (name, value) in [
            ("simulation.sim_resolution", simulation.sim_resolution),
            ("simulation.dye_resolution", simulation.dye_resolution),
        ] {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }

        for (name, value) in [
            ("simulation.density_dissipation", simulation.density_dissipation),
            ("simulation.velocity_dissipation", simulation.velocity_dissipation),
            ("simulation.curl", simulation.curl),
            ("splats.force", self.splats.force),
            ("splats.pointer_force", self.splats.pointer_force),
        ] {
            check_non_negative(name, value)?;
        }

        if let Some(value) = simulation.pressure_dissipation {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(
                    "simulation.pressure_dissipation must be within 0..=1".into(),
                ));
            }
        }

        if let Some(duration) = simulation.max_time_step {
            if duration.is_zero() {
                return Err(ConfigError::Invalid(
                    "simulation.max_time_step must be greater than zero".into(),
                ));
            }
        }

        if let Some(radius) = self.splats.radius {
            if radius.is_nan() || radius <= 0.0 {
                return Err(ConfigError::Invalid(
                    "splats.radius must be greater than zero".into(),
                ));
            }
        }

        for (name, color) in [
            ("splats.hover_color", self.splats.hover_color),
            ("display.back_color", self.display.back_color),
        ] {
            if let Some(rgb) = color {
                if rgb.iter().any(|channel| !(0.0..=1.0).contains(channel)) {
                    return Err(ConfigError::Invalid(format!(
                        "{name} channels must be within 0..=1"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn check_non_negative(name: &str, value: Option<f32>) -> Result<(), ConfigError> {
    match value {
        Some(v) if v.is_nan() || v < 0.0 => {
            Err(ConfigError::Invalid(format!("{name} must be >= 0")))
        }
        _ => Ok(()),
    }
}
