use anyhow::Context;
use casino_games::CasinoConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub config_file: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("casino"),
            config_file: None,
            verbose: false,
        }
    }
}

impl CliConfig {
    pub fn new(data_dir: Option<PathBuf>, config_file: Option<PathBuf>, verbose: bool) -> Self {
        let mut config = Self::default();
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        config.config_file = config_file;
        config.verbose = verbose;
        config
    }

    /// An explicit file must exist; otherwise `casino.json` in the data
    /// directory is used when present, and defaults when not.
    pub fn casino_config(&self) -> anyhow::Result<CasinoConfig> {
        match &self.config_file {
            Some(path) => load(path),
            None => {
                let path = self.data_dir.join("casino.json");
                if path.exists() {
                    load(&path)
                } else {
                    Ok(CasinoConfig::default())
                }
            }
        }
    }
}

fn load(path: &Path) -> anyhow::Result<CasinoConfig> {
    CasinoConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
