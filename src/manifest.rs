//! Remote version manifest.
//!
//! ```json
//! { "launcher": {"version": "1.1", "url": "https://..."},
//!   "system":   {"version": "3",   "url": "https://..."} }
//! ```
//!
//! Every key is optional. A component without both a version and a URL simply
//! has no update on offer.

use serde::Deserialize;
use std::time::Duration;

use crate::error::NetworkError;
use crate::fetch::HttpTransport;
use crate::utils::strip_bom_bytes;

pub const MANIFEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub launcher: Option<ComponentEntry>,
    #[serde(default)]
    pub system: Option<ComponentEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ComponentEntry {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A component version that can actually be downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release<'a> {
    pub version: &'a str,
    pub url: &'a str,
}

impl ComponentEntry {
    pub fn release(&self) -> Option<Release<'_>> {
        let version = self.version.as_deref().map(str::trim).unwrap_or_default();
        let url = self.url.as_deref().map(str::trim).unwrap_or_default();
        if version.is_empty() || url.is_empty() {
            return None;
        }
        Some(Release { version, url })
    }
}

impl VersionManifest {
    pub fn parse(body: &[u8]) -> Result<Self, NetworkError> {
        serde_json::from_slice(strip_bom_bytes(body))
            .map_err(|e| NetworkError::new(format!("malformed manifest: {}", e)))
    }

    pub fn launcher_release(&self) -> Option<Release<'_>> {
        self.launcher.as_ref().and_then(ComponentEntry::release)
    }

    pub fn system_release(&self) -> Option<Release<'_>> {
        self.system.as_ref().and_then(ComponentEntry::release)
    }
}

/// Where the orchestrator gets the manifest from.
pub trait ManifestSource {
    fn fetch_manifest(&self, url: &str) -> Result<VersionManifest, NetworkError>;
}

impl ManifestSource for HttpTransport {
    fn fetch_manifest(&self, url: &str) -> Result<VersionManifest, NetworkError> {
        if url.trim().is_empty() {
            return Err(NetworkError::new("no manifest URL configured"));
        }
        tracing::debug!("getting update info from {}", url);
        self.block_on(get_manifest(self.client(), url, self.manifest_timeout()))
    }
}

async fn get_manifest(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<VersionManifest, NetworkError> {
    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(NetworkError::new(format!("HTTP {}", status)));
    }
    let body = response.bytes().await?;
    VersionManifest::parse(&body)
}
