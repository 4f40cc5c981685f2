use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "BPFSCOPE_CONFIG";

/// How results are printed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Host paths and output preferences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Where the BPF filesystem is expected; named in pin diagnoses.
    pub bpffs_root: PathBuf,
    /// Sysfs file listing the possible CPUs.
    pub possible_cpus_path: PathBuf,
    /// Directory of this process's fd links, used to classify handles.
    pub proc_fd_dir: PathBuf,
    pub output: OutputFormat,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            bpffs_root: PathBuf::from("/sys/fs/bpf"),
            possible_cpus_path: PathBuf::from("/sys/devices/system/cpu/possible"),
            proc_fd_dir: PathBuf::from("/proc/self/fd"),
            output: OutputFormat::Text,
        }
    }
}

impl ToolConfig {
    /// Load from `explicit`, else from `$BPFSCOPE_CONFIG`, else defaults.
    /// A named file that can't be read is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(explicit, std::env::var_os(CONFIG_ENV))
    }

    fn load_with_env(explicit: Option<&Path>, env: Option<OsString>) -> Result<Self, ConfigError> {
        let path = match (explicit, env) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(env)) if !env.is_empty() => PathBuf::from(env),
            _ => return Ok(Self::default()),
        };
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
