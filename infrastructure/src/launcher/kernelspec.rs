//! Kernelspec discovery

use super::error::LaunchError;
use nbkernel_domain::KernelSpec;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SPEC_FILE: &str = "kernel.json";

/// Finds kernelspecs under a list of `kernels` directories.
///
/// Earlier directories win when two define the same name.
#[derive(Debug, Clone)]
pub struct KernelSpecStore {
    search_paths: Vec<PathBuf>,
}

impl KernelSpecStore {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Jupyter's standard locations: `$JUPYTER_PATH` entries, the user data
    /// directory, then the system prefixes.
    pub fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(jupyter_path) = std::env::var_os("JUPYTER_PATH") {
            paths.extend(std::env::split_paths(&jupyter_path).map(|p| p.join("kernels")));
        }
        if let Some(data) = dirs::data_dir() {
            paths.push(data.join("jupyter").join("kernels"));
        }
        paths.push(PathBuf::from("/usr/local/share/jupyter/kernels"));
        paths.push(PathBuf::from("/usr/share/jupyter/kernels"));
        paths
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Every readable spec, sorted by name. Broken specs are skipped.
    pub fn list(&self) -> Vec<KernelSpec> {
        let mut seen = HashSet::new();
        let mut specs = Vec::new();
        for dir in &self.search_paths {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if seen.contains(&name) {
                    continue;
                }
                let path = entry.path().join(SPEC_FILE);
                if !path.is_file() {
                    continue;
                }
                match read_spec(&path, &name) {
                    Ok(spec) => {
                        seen.insert(name);
                        specs.push(spec);
                    }
                    Err(e) => warn!("Skipping kernelspec: {}", e),
                }
            }
        }
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn find(&self, name: &str) -> Result<KernelSpec, LaunchError> {
        for dir in &self.search_paths {
            let path = dir.join(name).join(SPEC_FILE);
            if path.is_file() {
                debug!("Found kernelspec '{}' at {}", name, path.display());
                return read_spec(&path, name);
            }
        }
        Err(LaunchError::SpecNotFound(name.to_string()))
    }
}

fn read_spec(path: &Path, name: &str) -> Result<KernelSpec, LaunchError> {
    let text = std::fs::read_to_string(path)?;
    let mut spec: KernelSpec =
        serde_json::from_str(&text).map_err(|e| LaunchError::InvalidSpec {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if spec.argv.is_empty() {
        return Err(LaunchError::EmptyArgv(name.to_string()));
    }
    spec.name = name.to_string();
    Ok(spec)
}
