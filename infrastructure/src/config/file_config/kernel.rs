//! Kernel configuration from TOML (`[kernel]` section).

use super::ConfigValidationError;
use crate::launcher::{KernelSpecStore, LaunchConfig};
use crate::message_builder::StandardMessageBuilder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileKernelConfig {
    /// Kernelspec used when none is given on the command line
    pub default: Option<String>,
    /// `username` stamped into outgoing headers
    pub username: String,
    /// Address launched kernels bind to
    pub ip: String,
    /// Extra kernelspec directories, searched before the standard ones
    pub search_paths: Vec<PathBuf>,
    /// Where connection files are written
    pub connection_dir: Option<PathBuf>,
}

impl Default for FileKernelConfig {
    fn default() -> Self {
        Self {
            default: None,
            username: "nbkernel".to_string(),
            ip: "127.0.0.1".to_string(),
            search_paths: Vec::new(),
            connection_dir: None,
        }
    }
}

impl FileKernelConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.username.trim().is_empty() {
            return Err(ConfigValidationError::EmptyUsername);
        }
        Ok(())
    }

    pub fn to_launch_config(&self) -> LaunchConfig {
        let mut config = LaunchConfig {
            ip: self.ip.clone(),
            ..Default::default()
        };
        if let Some(dir) = &self.connection_dir {
            config.connection_dir = dir.clone();
        }
        config
    }

    pub fn spec_store(&self) -> KernelSpecStore {
        let mut paths = self.search_paths.clone();
        paths.extend(KernelSpecStore::default_search_paths());
        KernelSpecStore::new(paths)
    }

    pub fn message_builder(&self) -> StandardMessageBuilder {
        StandardMessageBuilder::new(self.username.clone())
    }
}
