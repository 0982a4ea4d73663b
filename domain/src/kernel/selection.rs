//! What a session should attach to

use super::spec::KernelSpec;
use crate::protocol::connection_info::ConnectionInfo;

/// Target of `connect` / `change_kernel`.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelSelection {
    /// Launch a new kernel from a kernelspec.
    Spec(KernelSpec),
    /// Attach to an already running kernel through its connection file.
    Running(ConnectionInfo),
    /// A kernel that lives on a Jupyter server.
    Live { id: String, name: String },
}

impl KernelSelection {
    /// Human readable name for logs.
    pub fn display_name(&self) -> &str {
        match self {
            KernelSelection::Spec(spec) => &spec.display_name,
            KernelSelection::Running(info) => info.kernel_name.as_deref().unwrap_or("kernel"),
            KernelSelection::Live { name, .. } => name,
        }
    }
}
