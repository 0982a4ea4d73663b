//! Local kernel processes.
//!
//! - [`KernelSpecStore`] discovers `kernel.json` files
//! - [`connection_file`] allocates ports and writes connection files
//! - [`KernelLauncher`] starts a kernel and hands back a supervised
//!   [`KernelProcess`]

pub mod connection_file;
pub mod error;
pub mod kernelspec;
pub mod process;

pub use error::LaunchError;
pub use kernelspec::KernelSpecStore;
pub use process::{KernelLauncher, KernelProcess, LaunchConfig};
