//! Port for creating kernel connections.

use super::kernel_connection::KernelConnection;
use async_trait::async_trait;
use nbkernel_domain::{KernelError, KernelSelection};
use std::sync::Arc;

/// Creates [`KernelConnection`]s for a [`KernelSelection`].
///
/// Restarting is the factory's job: a raw kernel is restarted by launching a
/// fresh process and connecting to it, a server kernel by asking the server.
#[async_trait]
pub trait KernelConnectionFactory: Send + Sync {
    async fn connect(
        &self,
        selection: &KernelSelection,
    ) -> Result<Arc<dyn KernelConnection>, KernelError>;

    /// Restart the kernel behind `current`.
    ///
    /// May return `current` itself when the kernel restarts in place.
    async fn restart(
        &self,
        current: Arc<dyn KernelConnection>,
        selection: &KernelSelection,
    ) -> Result<Arc<dyn KernelConnection>, KernelError>;
}
