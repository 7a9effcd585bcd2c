use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "HEROFLUID_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "herofluid.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Herofluid";
const APPLICATION: &str = "Herofluid";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        if let Some(dir) = env::var_os(ENV_CONFIG_DIR) {
            return Ok(Self {
                config_dir: PathBuf::from(dir),
            });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }
}
