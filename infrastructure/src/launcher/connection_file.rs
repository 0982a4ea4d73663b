//! Connection files and port allocation

use super::error::LaunchError;
use crate::wire::signer::HMAC_SHA256;
use nbkernel_domain::ConnectionInfo;
use std::net::TcpListener;
use std::path::{Path, PathBuf};

/// Reserve `count` distinct free TCP ports on `ip`.
///
/// All listeners are held until every port is chosen so the same port is
/// never handed out twice; they are released before returning.
pub fn allocate_ports(ip: &str, count: usize) -> Result<Vec<u16>, LaunchError> {
    let listeners = (0..count)
        .map(|_| TcpListener::bind((ip, 0)))
        .collect::<Result<Vec<_>, _>>()?;
    listeners
        .iter()
        .map(|l| l.local_addr().map(|addr| addr.port()).map_err(LaunchError::from))
        .collect()
}

/// Fresh handshake parameters with a random signing key.
pub fn new_connection_info(ip: &str, kernel_name: Option<&str>) -> Result<ConnectionInfo, LaunchError> {
    let ports = allocate_ports(ip, 5)?;
    Ok(ConnectionInfo {
        version: 5,
        transport: "tcp".to_string(),
        ip: ip.to_string(),
        shell_port: ports[0],
        iopub_port: ports[1],
        stdin_port: ports[2],
        hb_port: ports[3],
        control_port: ports[4],
        signature_scheme: HMAC_SHA256.to_string(),
        key: uuid::Uuid::new_v4().to_string(),
        kernel_name: kernel_name.map(str::to_string),
    })
}

/// Write `info` to `dir/kernel-<uuid>.json`, creating `dir` if needed.
pub fn write_connection_file(dir: &Path, info: &ConnectionInfo) -> Result<PathBuf, LaunchError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("kernel-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, serde_json::to_vec_pretty(info)?)?;
    Ok(path)
}

/// Read an existing connection file (for attaching to a running kernel).
pub fn read_connection_file(path: &Path) -> Result<ConnectionInfo, LaunchError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
