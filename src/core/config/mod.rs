use std::io;
use std::path::PathBuf;

use thiserror::Error;

mod loader;
mod paths;

pub use loader::ConfigLoader;
pub use paths::ConfigPaths;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Startup configuration read from the rc file.
#[derive(Debug, Clone)]
pub struct Config {
    paths: ConfigPaths,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            paths: ConfigPaths::new()?,
        })
    }

    /// Reads the rc file from `path` instead of the default location.
    pub fn with_rc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.rc_path = path.into();
        self
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Applies the rc file to the process environment, which spawned
    /// programs inherit. Returns the number of variables set.
    pub fn load(&self) -> Result<usize, ConfigError> {
        ConfigLoader::new(&self.paths).load()
    }
}
