use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Lists regular, executable files directly under `dir`, sorted by file name.
///
/// Not recursive; imposes no manifest or version-negotiation format — the
/// host simply hands each path to [`conduit_manager::Manager::start`].
pub fn discover_plugins(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}
