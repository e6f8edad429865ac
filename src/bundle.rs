//! The on-disk "system" bundle: game client files plus a version marker.

use std::fs::{self, create_dir_all, File};
use std::io::copy;
use std::path::{Path, PathBuf};

use zip::result::{InvalidPassword, ZipError};
use zip::ZipArchive;

use crate::error::{ExtractError, PersistenceError};
use crate::utils::{is_safe_relative_path, remove_dir_quietly, strip_bom};

pub const VERSION_FILE: &str = "system_version.txt";

/// Passphrase every published system bundle is encrypted with.
pub const BUNDLE_PASSWORD: &[u8] = b"12345";

#[derive(Debug, Clone)]
pub struct SystemBundleStore {
    system_folder: PathBuf,
    version_file: PathBuf,
}

impl SystemBundleStore {
    pub fn new(system_folder: impl Into<PathBuf>) -> Self {
        let system_folder = system_folder.into();
        let version_file = system_folder.join(VERSION_FILE);
        Self {
            system_folder,
            version_file,
        }
    }

    pub fn system_folder(&self) -> &Path {
        &self.system_folder
    }

    pub fn version_file(&self) -> &Path {
        &self.version_file
    }

    /// Version of the last bundle that was fully applied.
    ///
    /// A missing, unreadable or non-UTF-8 marker all read as `None`.
    pub fn local_version(&self) -> Option<String> {
        let bytes = match fs::read(&self.version_file) {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("could not read {}: {}", self.version_file.display(), e);
                }
                return None;
            }
        };
        match String::from_utf8(bytes) {
            Ok(text) => Some(strip_bom(&text).trim().to_string()),
            Err(_) => {
                tracing::warn!("{} is not valid UTF-8, ignoring it", self.version_file.display());
                None
            }
        }
    }

    /// Deletes the whole bundle folder. Returns `false` instead of failing.
    pub fn remove_bundle(&self) -> bool {
        remove_dir_quietly(&self.system_folder)
    }

    /// Extracts `zip_path` over the bundle folder.
    ///
    /// Existing files are overwritten and new ones added; files the archive
    /// doesn't mention are left alone. Unencrypted entries are extracted
    /// without the password even when one is given.
    pub fn extract(&self, zip_path: &Path, password: Option<&[u8]>) -> Result<(), ExtractError> {
        if !zip_path.is_file() {
            return Err(ExtractError::Missing(zip_path.to_path_buf()));
        }
        let file = File::open(zip_path)?;
        let mut archive = ZipArchive::new(file).map_err(|source| ExtractError::InvalidArchive {
            path: zip_path.to_path_buf(),
            source,
        })?;

        create_dir_all(&self.system_folder)?;

        for i in 0..archive.len() {
            let encrypted = match archive.by_index(i) {
                Ok(_) => false,
                Err(ZipError::UnsupportedArchive(msg)) if msg == ZipError::PASSWORD_REQUIRED => true,
                Err(e) => return Err(e.into()),
            };

            let mut file = if encrypted {
                let Some(password) = password else {
                    return Err(ExtractError::BadPassword);
                };
                match archive.by_index_decrypt(i, password)? {
                    Ok(file) => file,
                    Err(InvalidPassword) => return Err(ExtractError::BadPassword),
                }
            } else {
                archive.by_index(i)?
            };

            let relative = match file.enclosed_name() {
                Some(name) if is_safe_relative_path(name) => name.to_path_buf(),
                _ => {
                    tracing::warn!("skipping archive entry with unsafe path: {}", file.name());
                    continue;
                }
            };
            let outpath = self.system_folder.join(&relative);

            if file.is_dir() {
                create_dir_all(&outpath)?;
                continue;
            }
            if let Some(p) = outpath.parent() {
                if !p.exists() {
                    create_dir_all(p)?;
                }
            }
            tracing::debug!("extracting {}", relative.display());
            let mut outfile = File::create(&outpath)?;
            copy(&mut file, &mut outfile)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;

                if let Some(mode) = file.unix_mode() {
                    fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
                }
            }
        }

        tracing::info!(
            "extracted {} entries into {}",
            archive.len(),
            self.system_folder.display()
        );
        Ok(())
    }

    /// Records `version` as the applied bundle version, replacing any previous one.
    pub fn set_version(&self, version: &str) -> Result<(), PersistenceError> {
        let persistence = |source| PersistenceError {
            path: self.version_file.clone(),
            source,
        };
        create_dir_all(&self.system_folder).map_err(persistence)?;
        fs::write(&self.version_file, version).map_err(persistence)?;
        Ok(())
    }
}
