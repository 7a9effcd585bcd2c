use std::fs;

use fluidconfig::{ConfigError, FluidFile, TimeStepSetting};
use tempfile::TempDir;

#[test]
fn loads_config_from_disk() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("herofluid.toml");
    fs::write(
        &path,
        r#"
version = 1

[simulation]
time_step = "fixed"
pressure_dissipation = 0.5

[splats]
hover = false
"#,
    )
    .unwrap();

    let config = FluidFile::from_path(&path).expect("load config");
    assert_eq!(config.simulation.time_step, Some(TimeStepSetting::Fixed));
    assert_eq!(config.simulation.pressure_dissipation, Some(0.5));
    assert_eq!(config.splats.hover, Some(false));
}

#[test]
fn missing_file_reports_io_error() {
    let root = TempDir::new().unwrap();
    let err = FluidFile::from_path(&root.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
