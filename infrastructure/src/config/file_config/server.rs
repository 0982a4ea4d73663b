//! Jupyter server configuration from TOML (`[server]` section).

use super::ConfigValidationError;
use serde::{Deserialize, Serialize};

/// When `url` is set, kernels are started through that server instead of
/// being launched locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

impl FileServerConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(url) = &self.url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigValidationError::InvalidServerUrl(url.clone()));
        }
        Ok(())
    }
}
