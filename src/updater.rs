//! Update check state machine.
//!
//! One check runs strictly in order: fetch the manifest, update the launcher
//! if it is out of date, then bring the system bundle to the advertised
//! version. Every step reports through the caller's [`StatusSink`]; errors
//! never escape, they become a status plus [`Outcome::Failed`].

use tempfile::TempDir;

use crate::bundle::{SystemBundleStore, BUNDLE_PASSWORD};
use crate::config::{LauncherConfig, LauncherPaths};
use crate::error::ExtractError;
use crate::fetch::{ArchiveSource, DownloadKind, HttpTransport};
use crate::manifest::{ManifestSource, Release, VersionManifest};
use crate::replace::{ReplaceOutcome, RunMode, SelfReplaceCoordinator};
use crate::status::{Outcome, Status, StatusSink, UpdateReport};

const BUNDLE_FILE: &str = "system_update.zip";

/// Runs one update check with the real HTTP transport.
///
/// This is the entry point a launcher shell calls. It blocks until the check
/// is done. When the report asks for a restart the caller must exit promptly
/// so the replacement helper can swap the executable.
pub fn check_for_updates(
    config: &LauncherConfig,
    paths: &LauncherPaths,
    sink: &mut dyn StatusSink,
) -> UpdateReport {
    let transport = match HttpTransport::new(config) {
        Ok(transport) => transport,
        Err(e) => {
            tracing::error!("could not set up HTTP client: {}", e);
            let mut session = UpdateSession::new(sink);
            session.emit(Status::CheckingUpdates);
            session.emit(Status::ManifestUnavailable);
            return session.finish(Done::failed());
        }
    };
    let replacer = SelfReplaceCoordinator::new(RunMode::detect(paths));
    Updater::new(config, paths, &transport, &transport, replacer).check_updates(sink)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Done {
    outcome: Outcome,
    restart: bool,
}

impl Done {
    fn failed() -> Self {
        Self {
            outcome: Outcome::Failed,
            restart: false,
        }
    }

    fn updated() -> Self {
        Self {
            outcome: Outcome::Updated,
            restart: false,
        }
    }
}

/// State for a single check. Its temp directory goes away with it.
struct UpdateSession<'s> {
    sink: &'s mut dyn StatusSink,
    manifest: Option<VersionManifest>,
    work_dir: Option<TempDir>,
    last_status: Option<Status>,
}

impl<'s> UpdateSession<'s> {
    fn new(sink: &'s mut dyn StatusSink) -> Self {
        Self {
            sink,
            manifest: None,
            work_dir: None,
            last_status: None,
        }
    }

    fn emit(&mut self, status: Status) {
        if status.is_error() {
            tracing::error!("update status: {} {:?}", status.code(), status);
        } else {
            tracing::info!("update status: {}", status.code());
        }
        self.sink.report(&status);
        self.last_status = Some(status);
    }

    fn finish(mut self, done: Done) -> UpdateReport {
        if let Some(work_dir) = self.work_dir.take() {
            let path = work_dir.path().to_path_buf();
            if let Err(e) = work_dir.close() {
                tracing::warn!("could not remove {}: {}", path.display(), e);
            }
        }
        if let Some(manifest) = &self.manifest {
            tracing::debug!("checked against {:?}", manifest);
        }
        tracing::info!("update check finished: {:?}", done.outcome);
        UpdateReport {
            outcome: done.outcome,
            restart_requested: done.restart,
            last_status: self.last_status,
        }
    }
}

pub struct Updater<'a> {
    config: &'a LauncherConfig,
    manifests: &'a dyn ManifestSource,
    archives: &'a dyn ArchiveSource,
    store: SystemBundleStore,
    replacer: SelfReplaceCoordinator,
}

impl<'a> Updater<'a> {
    pub fn new(
        config: &'a LauncherConfig,
        paths: &LauncherPaths,
        manifests: &'a dyn ManifestSource,
        archives: &'a dyn ArchiveSource,
        replacer: SelfReplaceCoordinator,
    ) -> Self {
        Self {
            config,
            manifests,
            archives,
            store: SystemBundleStore::new(paths.system_dir()),
            replacer,
        }
    }

    pub fn check_updates(&self, sink: &mut dyn StatusSink) -> UpdateReport {
        let mut session = UpdateSession::new(sink);
        let done = self.run(&mut session);
        session.finish(done)
    }

    fn run(&self, session: &mut UpdateSession<'_>) -> Done {
        session.emit(Status::CheckingUpdates);
        let manifest = match self.fetch_manifest() {
            Some(manifest) => manifest,
            None => {
                session.emit(Status::ManifestUnavailable);
                return Done::failed();
            }
        };
        let manifest = session.manifest.insert(manifest).clone();

        let mut launcher_staged = false;
        if let Some(release) = manifest.launcher_release() {
            match self.update_launcher(session, release) {
                LauncherStep::Current => {}
                LauncherStep::Staged => launcher_staged = true,
                LauncherStep::Stop(done) => return done,
            }
        }

        match manifest.system_release() {
            Some(release) => {
                let local = self.store.local_version();
                if local.as_deref() == Some(release.version) {
                    tracing::debug!("system bundle already at v{}", release.version);
                } else {
                    tracing::info!(
                        "system bundle {} -> {}",
                        local.as_deref().unwrap_or("none"),
                        release.version
                    );
                    return self.update_system(session, release);
                }
            }
            None => tracing::debug!("manifest offers no system bundle"),
        }

        if launcher_staged {
            return Done::updated();
        }
        session.emit(Status::UpToDate);
        Done {
            outcome: Outcome::NoUpdate,
            restart: false,
        }
    }

    fn fetch_manifest(&self) -> Option<VersionManifest> {
        let url = match self.config.manifest_url() {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("{}", e);
                return None;
            }
        };
        match self.manifests.fetch_manifest(url) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::error!("{}", e);
                None
            }
        }
    }

    fn update_launcher(&self, session: &mut UpdateSession<'_>, release: Release<'_>) -> LauncherStep {
        let local = self.config.launcher_version.trim();
        if release.version == local {
            tracing::debug!("launcher already at v{}", local);
            return LauncherStep::Current;
        }

        tracing::info!("launcher {} -> {}", local, release.version);
        session.emit(Status::UpdatingLauncher {
            version: release.version.to_string(),
        });
        match self
            .replacer
            .replace(self.archives, release.url, release.version)
        {
            Ok(ReplaceOutcome::RestartRequired) => {
                session.emit(Status::LauncherRestarting);
                LauncherStep::Stop(Done {
                    outcome: Outcome::Updated,
                    restart: true,
                })
            }
            Ok(ReplaceOutcome::Staged { path }) => {
                session.emit(Status::LauncherStaged { path });
                LauncherStep::Staged
            }
            Err(e) => {
                session.emit(Status::LauncherUpdateFailed {
                    reason: e.to_string(),
                });
                LauncherStep::Stop(Done::failed())
            }
        }
    }

    fn update_system(&self, session: &mut UpdateSession<'_>, release: Release<'_>) -> Done {
        session.emit(Status::DownloadingSystem {
            version: release.version.to_string(),
        });

        let work_dir = match tempfile::Builder::new().prefix("system-update-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                session.emit(Status::SystemDownloadFailed {
                    reason: e.to_string(),
                });
                return Done::failed();
            }
        };
        let zip_path = work_dir.path().join(BUNDLE_FILE);
        session.work_dir = Some(work_dir);

        if let Err(e) = self
            .archives
            .download(release.url, &zip_path, DownloadKind::Bundle)
        {
            session.emit(Status::SystemDownloadFailed {
                reason: e.to_string(),
            });
            return Done::failed();
        }

        session.emit(Status::ExtractingSystem);
        if let Err(e) = self.store.extract(&zip_path, Some(BUNDLE_PASSWORD)) {
            tracing::error!("{}", e);
            let status = match e {
                ExtractError::Missing(_) | ExtractError::InvalidArchive { .. } => {
                    Status::InvalidArchive
                }
                ExtractError::BadPassword => Status::BadPassword,
                other => Status::ExtractionFailed {
                    reason: other.to_string(),
                },
            };
            session.emit(status);
            return Done::failed();
        }

        if let Err(e) = self.store.set_version(release.version) {
            session.emit(Status::VersionCommitFailed {
                reason: e.to_string(),
            });
            return Done::failed();
        }

        session.emit(Status::SystemUpdated {
            version: release.version.to_string(),
        });
        Done::updated()
    }
}

enum LauncherStep {
    Current,
    Staged,
    Stop(Done),
}
