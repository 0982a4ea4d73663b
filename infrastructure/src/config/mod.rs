//! Configuration file loading for nbkernel
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `NBKERNEL_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./nbkernel.toml` or `./.nbkernel.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/nbkernel/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileKernelConfig, FileLoggingConfig, FileServerConfig,
    FileSessionConfig,
};
pub use loader::ConfigLoader;
