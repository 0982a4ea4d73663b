//! Application-level configuration.
//!
//! - [`SessionConfig`]: session deadlines and busy tracking

pub mod session_config;

pub use session_config::SessionConfig;
