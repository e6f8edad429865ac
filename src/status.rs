//! Status events emitted while an update check runs.
//!
//! The updater never produces display text. Each event is a code plus the
//! values a presentation layer needs to fill its own template (see
//! [`crate::locale`] for the shipped one).

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    CheckingUpdates,
    /// Manifest fetch failed; nothing else is attempted this check.
    ManifestUnavailable,
    UpdatingLauncher {
        version: String,
    },
    /// Development run: the new launcher was downloaded but not installed.
    LauncherStaged {
        path: PathBuf,
    },
    /// Helper process launched; the host must exit now.
    LauncherRestarting,
    LauncherUpdateFailed {
        reason: String,
    },
    DownloadingSystem {
        version: String,
    },
    ExtractingSystem,
    SystemUpdated {
        version: String,
    },
    SystemDownloadFailed {
        reason: String,
    },
    InvalidArchive,
    BadPassword,
    ExtractionFailed {
        reason: String,
    },
    VersionCommitFailed {
        reason: String,
    },
    UpToDate,
}

impl Status {
    /// Stable identifier for the event, independent of any language.
    pub fn code(&self) -> &'static str {
        match self {
            Status::CheckingUpdates => "checking_updates",
            Status::ManifestUnavailable => "manifest_unavailable",
            Status::UpdatingLauncher { .. } => "updating_launcher",
            Status::LauncherStaged { .. } => "launcher_staged",
            Status::LauncherRestarting => "launcher_restarting",
            Status::LauncherUpdateFailed { .. } => "launcher_update_failed",
            Status::DownloadingSystem { .. } => "downloading_system",
            Status::ExtractingSystem => "extracting_system",
            Status::SystemUpdated { .. } => "system_updated",
            Status::SystemDownloadFailed { .. } => "system_download_failed",
            Status::InvalidArchive => "invalid_archive",
            Status::BadPassword => "bad_password",
            Status::ExtractionFailed { .. } => "extraction_failed",
            Status::VersionCommitFailed { .. } => "version_commit_failed",
            Status::UpToDate => "up_to_date",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Status::ManifestUnavailable
                | Status::LauncherUpdateFailed { .. }
                | Status::SystemDownloadFailed { .. }
                | Status::InvalidArchive
                | Status::BadPassword
                | Status::ExtractionFailed { .. }
                | Status::VersionCommitFailed { .. }
        )
    }
}

/// Receives every status the updater emits, synchronously and in order.
///
/// Implementations must return promptly and must not panic.
pub trait StatusSink {
    fn report(&mut self, status: &Status);
}

impl<F> StatusSink for F
where
    F: FnMut(&Status),
{
    fn report(&mut self, status: &Status) {
        self(status)
    }
}

/// Final result of one update check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Updated,
    NoUpdate,
    Failed,
}

impl Outcome {
    /// The play control may only be enabled after a completed check.
    pub fn allows_play(self) -> bool {
        !matches!(self, Outcome::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub outcome: Outcome,
    /// Set after a successful self-replace hand-off. The host must exit.
    pub restart_requested: bool,
    pub last_status: Option<Status>,
}
