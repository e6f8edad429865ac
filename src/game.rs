//! Starting the game client from the system bundle.

use std::path::PathBuf;
use std::process::Command;

use crate::config::{LauncherConfig, LauncherPaths};
use crate::error::GameError;

/// Path of the configured game executable inside the bundle.
pub fn executable_path(config: &LauncherConfig, paths: &LauncherPaths) -> Result<PathBuf, GameError> {
    let start_file = config.start_file()?;
    Ok(paths.system_dir().join(start_file))
}

/// Launches the game and returns immediately; the launcher does not supervise it.
pub fn start(config: &LauncherConfig, paths: &LauncherPaths) -> Result<(), GameError> {
    let exe = executable_path(config, paths)?;
    if !exe.is_file() {
        return Err(GameError::NotFound(exe));
    }

    tracing::info!("launching {}", exe.display());
    Command::new(&exe)
        .current_dir(paths.system_dir())
        .spawn()
        .map(|_| ())
        .map_err(|source| GameError::Spawn { path: exe, source })
}
