//! Spanish and English text for status events and launcher labels.

use std::fmt;
use std::str::FromStr;

use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    Es,
    En,
}

impl Lang {
    pub fn toggle(self) -> Self {
        match self {
            Lang::Es => Lang::En,
            Lang::En => Lang::Es,
        }
    }
}

impl FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Lang::Es),
            "en" => Ok(Lang::En),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lang::Es => "es",
            Lang::En => "en",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Play,
    Ready,
    UpdateFailed,
}

pub fn label(label: Label, lang: Lang) -> &'static str {
    match (label, lang) {
        (Label::Play, Lang::Es) => "JUGAR",
        (Label::Play, Lang::En) => "PLAY",
        (Label::Ready, Lang::Es) => "Listo para jugar",
        (Label::Ready, Lang::En) => "Ready to play",
        (Label::UpdateFailed, Lang::Es) => "No se pudo conectar con el servidor de actualizaciones.",
        (Label::UpdateFailed, Lang::En) => "Could not connect to the update server.",
    }
}

/// Renders a status event in the requested language.
///
/// Switching language re-renders the last event; no text is ever parsed back.
pub fn render(status: &Status, lang: Lang) -> String {
    match lang {
        Lang::Es => render_es(status),
        Lang::En => render_en(status),
    }
}

fn render_es(status: &Status) -> String {
    match status {
        Status::CheckingUpdates => "Comprobando actualizaciones...".to_string(),
        Status::ManifestUnavailable => "No se pudo verificar la versión remota.".to_string(),
        Status::UpdatingLauncher { version } => format!("Actualizando launcher a v{}...", version),
        Status::LauncherStaged { path } => format!(
            "Modo desarrollo: el nuevo launcher se ha descargado en {}.",
            path.display()
        ),
        Status::LauncherRestarting => "Reiniciando launcher...".to_string(),
        Status::LauncherUpdateFailed { reason } => format!("Error actualizando launcher: {}", reason),
        Status::DownloadingSystem { version } => format!("Descargando System version {}...", version),
        Status::ExtractingSystem => "Descomprimiendo archivos del sistema...".to_string(),
        Status::SystemUpdated { version } => format!("Sistema actualizado a la versión {}.", version),
        Status::SystemDownloadFailed { .. } => "Error de red al descargar la actualización.".to_string(),
        Status::InvalidArchive => {
            "El archivo descargado no es un ZIP válido. Verifica la URL o tu conexión.".to_string()
        }
        Status::BadPassword => "Contraseña incorrecta para el ZIP del system.".to_string(),
        Status::ExtractionFailed { reason } => format!("Error descomprimiendo el sistema: {}", reason),
        Status::VersionCommitFailed { .. } => {
            "Error al guardar la nueva versión del sistema.".to_string()
        }
        Status::UpToDate => "Cliente Actualizado".to_string(),
    }
}

fn render_en(status: &Status) -> String {
    match status {
        Status::CheckingUpdates => "Checking updates...".to_string(),
        Status::ManifestUnavailable => "Could not verify remote version.".to_string(),
        Status::UpdatingLauncher { version } => format!("Updating launcher to v{}...", version),
        Status::LauncherStaged { path } => format!(
            "Development mode: the new launcher was downloaded to {}.",
            path.display()
        ),
        Status::LauncherRestarting => "Restarting launcher...".to_string(),
        Status::LauncherUpdateFailed { reason } => format!("Error updating launcher: {}", reason),
        Status::DownloadingSystem { version } => format!("Downloading System version {}...", version),
        Status::ExtractingSystem => "Extracting system files...".to_string(),
        Status::SystemUpdated { version } => format!("System updated to version {}.", version),
        Status::SystemDownloadFailed { .. } => "Network error while downloading the update.".to_string(),
        Status::InvalidArchive => {
            "The downloaded file is not a valid ZIP. Check the URL or your connection.".to_string()
        }
        Status::BadPassword => "Wrong password for the system ZIP.".to_string(),
        Status::ExtractionFailed { reason } => format!("Error extracting the system: {}", reason),
        Status::VersionCommitFailed { .. } => "Error saving the new system version.".to_string(),
        Status::UpToDate => "Client Updated".to_string(),
    }
}
