//! Replacing the running launcher executable.
//!
//! A running program can't reliably delete or overwrite its own binary, so the
//! swap is handed to a short script run by the OS shell in a detached process:
//! wait for this process to exit, delete the old executable, move the new one
//! onto its path, relaunch it. The launcher itself never touches the live
//! executable; it only downloads, writes the script, starts it and asks the
//! host to exit.

use std::fs::{self, create_dir_all};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::LauncherPaths;
use crate::error::ReplaceError;
use crate::fetch::{ArchiveSource, DownloadKind};

/// Seconds the helper waits before touching the old executable.
pub const HANDOFF_DELAY_SECS: u32 = 2;

/// How the launcher was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Deployed binary: replace it in place.
    Packaged { executable: PathBuf },
    /// Started from a cargo build: only download, never replace.
    Development { staging_dir: PathBuf },
}

impl RunMode {
    pub fn detect(paths: &LauncherPaths) -> Self {
        let staging_dir = paths.staging_dir();
        if std::env::var_os("CARGO").is_some() {
            return RunMode::Development { staging_dir };
        }
        match std::env::current_exe() {
            Ok(exe) if !is_cargo_build_output(&exe) => RunMode::Packaged { executable: exe },
            Ok(_) => RunMode::Development { staging_dir },
            Err(e) => {
                tracing::warn!("cannot locate own executable, self-replace disabled: {}", e);
                RunMode::Development { staging_dir }
            }
        }
    }
}

/// True for binaries living in a cargo `target/<profile>` directory.
pub fn is_cargo_build_output(exe: &Path) -> bool {
    let names: Vec<_> = exe
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect();
    names
        .windows(2)
        .any(|pair| pair[0] == "target" && matches!(pair[1], "debug" | "release"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    /// `cmd.exe` batch file.
    Batch,
    /// POSIX `sh` script.
    Posix,
}

impl ScriptFlavor {
    pub fn host() -> Self {
        if cfg!(windows) {
            ScriptFlavor::Batch
        } else {
            ScriptFlavor::Posix
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ScriptFlavor::Batch => "replace_launcher.bat",
            ScriptFlavor::Posix => "replace_launcher.sh",
        }
    }
}

/// Everything the helper needs to finish the swap on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandOff {
    pub old_executable: PathBuf,
    pub new_executable: PathBuf,
    /// Temp directory holding the new binary and the script; removed last.
    pub work_dir: PathBuf,
    pub delay_secs: u32,
}

pub fn render_helper_script(flavor: ScriptFlavor, plan: &HandOff) -> String {
    let install_dir = plan
        .old_executable
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    match flavor {
        ScriptFlavor::Batch => {
            let old = batch_quote(&plan.old_executable);
            format!(
                "@echo off\r\n\
                 timeout /t {delay} /nobreak > nul\r\n\
                 del /f /q {old}\r\n\
                 move /y {new} {old}\r\n\
                 cd /d {dir}\r\n\
                 start \"\" {old}\r\n\
                 (goto) 2>nul & rmdir /s /q {work}\r\n",
                delay = plan.delay_secs,
                old = old,
                new = batch_quote(&plan.new_executable),
                dir = batch_quote(&install_dir),
                work = batch_quote(&plan.work_dir),
            )
        }
        ScriptFlavor::Posix => {
            let old = sh_quote(&plan.old_executable);
            format!(
                "#!/bin/sh\n\
                 sleep {delay}\n\
                 rm -f {old}\n\
                 mv -f {new} {old}\n\
                 chmod +x {old}\n\
                 cd {dir} && {old} >/dev/null 2>&1 &\n\
                 rm -rf {work}\n",
                delay = plan.delay_secs,
                old = old,
                new = sh_quote(&plan.new_executable),
                dir = sh_quote(&install_dir),
                work = sh_quote(&plan.work_dir),
            )
        }
    }
}

fn batch_quote(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

fn sh_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

/// Starts the helper script without waiting for it.
pub trait HelperSpawner {
    fn spawn_detached(&self, flavor: ScriptFlavor, script: &Path) -> io::Result<()>;
}

/// Runs the script through the platform shell, detached from this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellSpawner;

impl HelperSpawner for ShellSpawner {
    fn spawn_detached(&self, flavor: ScriptFlavor, script: &Path) -> io::Result<()> {
        let mut cmd = match flavor {
            ScriptFlavor::Batch => {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(script);
                cmd
            }
            ScriptFlavor::Posix => {
                let mut cmd = Command::new("sh");
                cmd.arg(script);
                cmd
            }
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut cmd);
        cmd.spawn().map(|_| ())
    }
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(unix)]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    cmd.process_group(0);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut Command) {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Development run: the new binary was only downloaded.
    Staged { path: PathBuf },
    /// Helper is running; the host must exit for it to proceed.
    RestartRequired,
}

pub struct SelfReplaceCoordinator {
    mode: RunMode,
    flavor: ScriptFlavor,
    spawner: Box<dyn HelperSpawner>,
}

impl SelfReplaceCoordinator {
    pub fn new(mode: RunMode) -> Self {
        Self::with_spawner(mode, ScriptFlavor::host(), Box::new(ShellSpawner))
    }

    pub fn with_spawner(
        mode: RunMode,
        flavor: ScriptFlavor,
        spawner: Box<dyn HelperSpawner>,
    ) -> Self {
        Self {
            mode,
            flavor,
            spawner,
        }
    }

    pub fn replace(
        &self,
        source: &dyn ArchiveSource,
        url: &str,
        version: &str,
    ) -> Result<ReplaceOutcome, ReplaceError> {
        let file_name = format!("launcher_new{}", std::env::consts::EXE_SUFFIX);
        match &self.mode {
            RunMode::Development { staging_dir } => {
                create_dir_all(staging_dir).map_err(ReplaceError::Workspace)?;
                let path = staging_dir.join(&file_name);
                source.download(url, &path, DownloadKind::Launcher)?;
                tracing::info!(
                    "development run: launcher v{} downloaded to {}, not installing it",
                    version,
                    path.display()
                );
                Ok(ReplaceOutcome::Staged { path })
            }
            RunMode::Packaged { executable } => {
                let work = tempfile::Builder::new()
                    .prefix("launcher-update-")
                    .tempdir()
                    .map_err(ReplaceError::Workspace)?;
                let new_executable = work.path().join(&file_name);
                source.download(url, &new_executable, DownloadKind::Launcher)?;

                let plan = HandOff {
                    old_executable: executable.clone(),
                    new_executable,
                    work_dir: work.path().to_path_buf(),
                    delay_secs: HANDOFF_DELAY_SECS,
                };
                let script = work.path().join(self.flavor.file_name());
                fs::write(&script, render_helper_script(self.flavor, &plan)).map_err(|source| {
                    ReplaceError::Script {
                        path: script.clone(),
                        source,
                    }
                })?;

                tracing::info!("starting launcher replacement with v{}", version);
                self.spawner
                    .spawn_detached(self.flavor, &script)
                    .map_err(ReplaceError::Spawn)?;

                // the helper owns the directory from here on
                let _ = work.keep();
                Ok(ReplaceOutcome::RestartRequired)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> HandOff {
        HandOff {
            old_executable: PathBuf::from("/opt/my game/launcher"),
            new_executable: PathBuf::from("/tmp/launcher-update-x/launcher_new"),
            work_dir: PathBuf::from("/tmp/launcher-update-x"),
            delay_secs: 2,
        }
    }

    #[test]
    fn posix_script_waits_then_swaps_then_relaunches() {
        let script = render_helper_script(ScriptFlavor::Posix, &plan());
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(
            lines,
            vec![
                "#!/bin/sh",
                "sleep 2",
                "rm -f '/opt/my game/launcher'",
                "mv -f '/tmp/launcher-update-x/launcher_new' '/opt/my game/launcher'",
                "chmod +x '/opt/my game/launcher'",
                "cd '/opt/my game' && '/opt/my game/launcher' >/dev/null 2>&1 &",
                "rm -rf '/tmp/launcher-update-x'",
            ]
        );
    }

    #[test]
    fn batch_script_uses_cmd_builtins() {
        let script = render_helper_script(ScriptFlavor::Batch, &plan());
        let wait = script.find("timeout /t 2").unwrap();
        let delete = script.find("del /f /q").unwrap();
        let relaunch = script.find("start \"\"").unwrap();
        assert!(wait < delete && delete < relaunch);
        assert!(script.contains("\"/opt/my game/launcher\""));
        assert!(script.ends_with("\r\n"));
    }

    #[test]
    fn single_quotes_are_escaped_for_sh() {
        assert_eq!(sh_quote(Path::new("/it's/here")), r"'/it'\''s/here'");
    }

    #[test]
    fn cargo_output_is_development() {
        assert!(is_cargo_build_output(Path::new("/src/app/target/debug/launcher")));
        assert!(is_cargo_build_output(Path::new(
            "/src/app/target/release/launcher.exe"
        )));
        assert!(!is_cargo_build_output(Path::new("/opt/game/launcher")));
        assert!(!is_cargo_build_output(Path::new("/opt/target/launcher")));
    }
}
