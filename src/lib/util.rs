// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::NetfabError;

const FALLBACK_SEARCH_DIRS: [&str; 4] =
    ["/sbin", "/usr/sbin", "/bin", "/usr/bin"];

/// Locate an executable by searching `PATH` and the usual sbin/bin
/// directories.
pub(crate) fn which(program: &str) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Ok(path_env) = std::env::var("PATH") {
        dirs.extend(std::env::split_paths(&path_env));
    }
    dirs.extend(FALLBACK_SEARCH_DIRS.iter().map(PathBuf::from));
    for dir in dirs {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Resolve a config-relative path (possibly written with a leading
/// slash) under the render target directory.
pub(crate) fn target_path(target: &Path, relpath: &str) -> PathBuf {
    target.join(relpath.trim_start_matches('/'))
}

pub(crate) fn write_file(
    path: &Path,
    content: &str,
) -> Result<(), NetfabError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    log::debug!("Writing {}", path.display());
    std::fs::write(path, content)?;
    Ok(())
}
