//! Kernel-side concepts.
//!
//! - [`status::KernelStatus`]: raw lifecycle states reported by a kernel
//!   connection
//! - [`spec::KernelSpec`]: a `kernel.json` launch description
//! - [`selection::KernelSelection`]: what a session attaches to

pub mod selection;
pub mod spec;
pub mod status;
