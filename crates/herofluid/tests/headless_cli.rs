use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn herofluid(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_herofluid"));
    command
        .env("HEROFLUID_CONFIG_DIR", config_dir)
        .env_remove("HEROFLUID_CONFIG")
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn headless_run_reads_the_discovered_config() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("herofluid.toml"),
        r#"
version = 1

[simulation]
sim_resolution = 16
dye_resolution = 32
pressure_iterations = 4

[splats]
ignition = 4
"#,
    )
    .unwrap();

    let output = herofluid(root.path())
        .args(["--headless-frames", "5", "--size", "64x48", "--seed", "3"])
        .output()
        .expect("failed to run herofluid");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rendered 5 frames at 64x48"), "{stdout}");
}

#[test]
fn invalid_config_file_fails() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("broken.toml");
    fs::write(&path, "version = 2\n").unwrap();

    let output = herofluid(root.path())
        .arg("--config")
        .arg(&path)
        .args(["--headless-frames", "1"])
        .output()
        .expect("failed to run herofluid");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load config"), "{stderr}");
}
