//! Kernel process supervision.

use super::connection_file::{new_connection_info, write_connection_file};
use super::error::LaunchError;
use nbkernel_domain::{ConnectionInfo, KernelSpec};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where and how kernels are started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Address the kernel binds its sockets to.
    pub ip: String,
    /// Directory connection files are written to.
    pub connection_dir: PathBuf,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            connection_dir: default_connection_dir(),
        }
    }
}

/// `$XDG_RUNTIME_DIR/jupyter`, falling back to the system temp directory.
pub fn default_connection_dir() -> PathBuf {
    dirs::runtime_dir()
        .map(|d| d.join("jupyter"))
        .unwrap_or_else(|| std::env::temp_dir().join("nbkernel"))
}

/// Starts kernels from kernelspecs.
#[derive(Debug, Clone, Default)]
pub struct KernelLauncher {
    config: LaunchConfig,
}

impl KernelLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Write a connection file and spawn `spec`'s argv against it.
    pub async fn launch(&self, spec: &KernelSpec) -> Result<KernelProcess, LaunchError> {
        if spec.argv.is_empty() {
            return Err(LaunchError::EmptyArgv(spec.name.clone()));
        }
        let info = new_connection_info(&self.config.ip, Some(&spec.name))?;
        let connection_file = write_connection_file(&self.config.connection_dir, &info)?;
        let argv = spec.resolved_argv(&connection_file.to_string_lossy());
        let program = &argv[0];

        debug!("Launching kernel '{}': {:?}", spec.name, argv);
        let mut cmd = Command::new(program);
        cmd.args(&argv[1..])
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Linux: have the OS send SIGTERM to the kernel if this process dies.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let _ = std::fs::remove_file(&connection_file);
                return Err(LaunchError::Spawn {
                    program: program.clone(),
                    source,
                });
            }
        };
        info!(
            "Started kernel '{}' (pid {:?}) with {}",
            spec.name,
            child.id(),
            connection_file.display()
        );

        if let Some(stderr) = child.stderr.take() {
            let name = spec.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{}] {}", name, line);
                }
            });
        }

        Ok(KernelProcess::supervise(child, info, connection_file))
    }
}

/// A running kernel process.
///
/// The process is killed when this value is dropped, and its connection
/// file is removed once it exits.
pub struct KernelProcess {
    pid: Option<u32>,
    info: ConnectionInfo,
    connection_file: PathBuf,
    kill: CancellationToken,
    exited: CancellationToken,
}

impl KernelProcess {
    fn supervise(mut child: Child, info: ConnectionInfo, connection_file: PathBuf) -> Self {
        let pid = child.id();
        let kill = CancellationToken::new();
        let exited = CancellationToken::new();

        {
            let kill = kill.clone();
            let exited = exited.clone();
            let file = connection_file.clone();
            tokio::spawn(async move {
                tokio::select! {
                    status = child.wait() => match status {
                        Ok(status) => info!("Kernel process {:?} exited: {}", pid, status),
                        Err(e) => warn!("Could not wait for kernel process {:?}: {}", pid, e),
                    },
                    _ = kill.cancelled() => {
                        debug!("Killing kernel process {:?}", pid);
                        if let Err(e) = child.kill().await {
                            warn!("Could not kill kernel process {:?}: {}", pid, e);
                        }
                    }
                }
                if let Err(e) = tokio::fs::remove_file(&file).await {
                    debug!("Could not remove {}: {}", file.display(), e);
                }
                exited.cancel();
            });
        }

        Self {
            pid,
            info,
            connection_file,
            kill,
            exited,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn connection_file(&self) -> &Path {
        &self.connection_file
    }

    /// Cancelled once the process has exited.
    pub fn exited(&self) -> CancellationToken {
        self.exited.clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exited.is_cancelled()
    }

    /// Send SIGINT.
    #[cfg(unix)]
    pub fn interrupt(&self) -> Result<(), LaunchError> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        if self.has_exited() {
            return Ok(());
        }
        debug!("Sending SIGINT to kernel process {}", pid);
        let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
        if result == 0 {
            Ok(())
        } else {
            Err(LaunchError::Io(std::io::Error::last_os_error()))
        }
    }

    #[cfg(not(unix))]
    pub fn interrupt(&self) -> Result<(), LaunchError> {
        Err(LaunchError::InterruptUnsupported)
    }

    /// Kill the process without waiting for it.
    pub fn kill(&self) {
        self.kill.cancel();
    }

    /// Wait up to `grace` for the process to exit on its own, then kill it.
    pub async fn terminate(&self, grace: Duration) {
        if tokio::time::timeout(grace, self.exited.cancelled())
            .await
            .is_err()
        {
            warn!("Kernel process {:?} did not exit in {:?}", self.pid, grace);
            self.kill();
            self.exited.cancelled().await;
        }
    }
}

impl Drop for KernelProcess {
    fn drop(&mut self) {
        self.kill.cancel();
    }
}

impl std::fmt::Debug for KernelProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelProcess")
            .field("pid", &self.pid)
            .field("connection_file", &self.connection_file)
            .field("exited", &self.has_exited())
            .finish()
    }
}
