//! CLI configuration.
//!
//! Loaded from `~/.config/flowsh/config.toml`, or from the file named by
//! `FLOWSH_CONFIG`. A missing file means defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use flowsh_kernel::KernelConfig;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "FLOWSH_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Program used to run `-e` commands.
    pub shell: String,

    /// Extra directories searched for bare module names.
    pub module_dirs: Vec<PathBuf>,

    /// Send error messages to stdout instead of stderr, as if every
    /// pipeline carried `--printerror`.
    pub print_errors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            module_dirs: Vec::new(),
            print_errors: false,
        }
    }
}

impl Config {
    /// Load from `FLOWSH_CONFIG` or the default path.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => match Self::config_path() {
                Some(path) => path,
                None => {
                    tracing::debug!("no config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "flowsh").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Kernel settings for a run from `cwd`.
    pub fn kernel_config(&self, cwd: PathBuf) -> KernelConfig {
        self.module_dirs.iter().fold(
            KernelConfig::default().with_cwd(cwd).with_shell(&self.shell),
            |config, dir| config.with_module_dir(dir),
        )
    }
}
