//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Conversions into the typed configs used by the session and launcher live
//! next to each section.

mod kernel;
mod logging;
mod server;
mod session;

pub use kernel::FileKernelConfig;
pub use logging::FileLoggingConfig;
pub use server::FileServerConfig;
pub use session::FileSessionConfig;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configuration value that cannot be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("kernel.username must not be empty")]
    EmptyUsername,

    #[error("server.url is not a valid URL: {0}")]
    InvalidServerUrl(String),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Session deadlines and busy tracking
    pub session: FileSessionConfig,
    /// Kernel discovery and launching
    pub kernel: FileKernelConfig,
    /// Jupyter server connection
    pub server: FileServerConfig,
    /// Protocol message logging
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.session.validate()?;
        self.kernel.validate()?;
        self.server.validate()?;
        Ok(())
    }
}
