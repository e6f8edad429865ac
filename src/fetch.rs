//! Streaming downloads for launcher binaries and system bundles.
//!
//! Links pointing at the hosted file provider can't be fetched directly; they
//! go through a [`HostedProvider`] ([`MegaProvider`] unless a relay is
//! configured) that produces a local file, which is then moved onto the
//! requested destination. Everything else is a plain HTTP(S)
//! download streamed to disk chunk by chunk.

use std::fs::{self, File};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::LauncherConfig;
use crate::error::DownloadError;
use crate::manifest::MANIFEST_TIMEOUT;
use crate::mega::MegaProvider;
use crate::utils::megabytes;

/// URL fragment identifying links on the hosted file provider.
pub const HOSTED_PROVIDER_MARKER: &str = "mega.nz";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("launcher-updater/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// New launcher executable.
    Launcher,
    /// System bundle archive.
    Bundle,
}

impl DownloadKind {
    /// Longest wait for the next chunk before the download is abandoned.
    pub fn stall_timeout(self) -> Duration {
        match self {
            DownloadKind::Launcher => Duration::from_secs(300),
            DownloadKind::Bundle => Duration::from_secs(60),
        }
    }
}

pub fn is_hosted_link(url: &str) -> bool {
    url.contains(HOSTED_PROVIDER_MARKER)
}

/// Downloads `url` to `dest`. Partial files are left behind on failure.
pub trait ArchiveSource {
    fn download(&self, url: &str, dest: &Path, kind: DownloadKind) -> Result<(), DownloadError>;
}

/// Provider-specific download routine for hosted links.
pub trait HostedProvider {
    /// Downloads `url` into `dir` and returns the path of the produced file.
    fn fetch_into(
        &self,
        transport: &HttpTransport,
        url: &str,
        dir: &Path,
        kind: DownloadKind,
    ) -> Result<PathBuf, DownloadError>;
}

/// Relays hosted links through a proxy endpoint: `<endpoint>?uri=<link>`.
///
/// Only used when `ProviderProxyUrl` is set; otherwise links are downloaded
/// straight from the provider by [`MegaProvider`].
#[derive(Debug, Clone)]
pub struct ProxyProvider {
    endpoint: String,
}

impl ProxyProvider {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }

    pub fn proxy_url(&self, url: &str) -> String {
        format!(
            "{}?uri={}",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(url)
        )
    }
}

impl HostedProvider for ProxyProvider {
    fn fetch_into(
        &self,
        transport: &HttpTransport,
        url: &str,
        dir: &Path,
        kind: DownloadKind,
    ) -> Result<PathBuf, DownloadError> {
        let proxy_url = self.proxy_url(url);
        tracing::debug!("downloading via proxy: {}", proxy_url);
        let target = dir.join("hosted_download.part");
        transport.stream_to_file(&proxy_url, &target, kind)?;
        Ok(target)
    }
}

fn hosted_provider(config: &LauncherConfig) -> Box<dyn HostedProvider> {
    match config.provider_proxy() {
        Some(endpoint) => Box::new(ProxyProvider::new(endpoint)),
        None => Box::new(MegaProvider::default()),
    }
}

/// HTTP client plus the runtime it is driven on.
///
/// Calls block the current thread, so this must not be used from inside
/// another tokio runtime.
pub struct HttpTransport {
    runtime: tokio::runtime::Runtime,
    client: reqwest::Client,
    hosted: Box<dyn HostedProvider>,
    manifest_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &LauncherConfig) -> Result<Self, DownloadError> {
        Self::with_provider(hosted_provider(config))
    }

    /// Fails when called from inside an async runtime: every request is
    /// driven with `block_on`, which tokio refuses to nest.
    pub fn with_provider(hosted: Box<dyn HostedProvider>) -> Result<Self, DownloadError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(DownloadError::Runtime(
                "called from inside an async runtime, run the check on a blocking thread".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DownloadError::Runtime(e.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            runtime,
            client,
            hosted,
            manifest_timeout: MANIFEST_TIMEOUT,
        })
    }

    pub fn with_manifest_timeout(mut self, timeout: Duration) -> Self {
        self.manifest_timeout = timeout;
        self
    }

    pub fn manifest_timeout(&self) -> Duration {
        self.manifest_timeout
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Direct download of `url` into `dest`, returns the number of bytes written.
    pub fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        kind: DownloadKind,
    ) -> Result<u64, DownloadError> {
        self.block_on(stream_to_file(&self.client, url, dest, kind, &mut |_: &mut [u8]| {}))
    }

    /// Like [`HttpTransport::stream_to_file`], passing every chunk through
    /// `transform` before it is written.
    pub fn stream_transformed(
        &self,
        url: &str,
        dest: &Path,
        kind: DownloadKind,
        transform: &mut dyn FnMut(&mut [u8]),
    ) -> Result<u64, DownloadError> {
        self.block_on(stream_to_file(&self.client, url, dest, kind, transform))
    }
}

impl ArchiveSource for HttpTransport {
    fn download(&self, url: &str, dest: &Path, kind: DownloadKind) -> Result<(), DownloadError> {
        if is_hosted_link(url) {
            tracing::info!("downloading {} through the hosted provider", url);
            let dir = match dest.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let produced = self.hosted.fetch_into(self, url, dir, kind)?;
            if produced != dest {
                fs::rename(&produced, dest)?;
            }
        } else {
            tracing::info!("downloading {} directly", url);
            self.stream_to_file(url, dest, kind)?;
        }
        Ok(())
    }
}

async fn stream_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    kind: DownloadKind,
    transform: &mut dyn FnMut(&mut [u8]),
) -> Result<u64, DownloadError> {
    let stall = kind.stall_timeout();
    let mut res = match tokio::time::timeout(stall, client.get(url).send()).await {
        Ok(res) => res?,
        Err(_) => return Err(DownloadError::Stalled(stall)),
    };
    if !res.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: res.status().as_u16(),
        });
    }

    let mut file = File::create(dest)?;
    let file_size = res.content_length();
    let mut downloaded: u64 = 0;
    let mut last_update_time = Instant::now();

    loop {
        let chunk = match tokio::time::timeout(stall, res.chunk()).await {
            Ok(chunk) => chunk?,
            Err(_) => return Err(DownloadError::Stalled(stall)),
        };
        let Some(chunk) = chunk else { break };
        let mut chunk = chunk.to_vec();
        transform(&mut chunk);
        file.write_all(&chunk)?;

        downloaded += chunk.len() as u64;
        let now = Instant::now();
        if now.duration_since(last_update_time) > Duration::from_secs(1) {
            last_update_time = now;
            let total = file_size
                .map(|n| megabytes(n).to_string())
                .unwrap_or_else(|| String::from("unknown"));
            tracing::info!("{} MB out of {} MB downloaded", megabytes(downloaded), total);
        }
    }
    file.flush()?;

    tracing::debug!("wrote {} bytes to {}", downloaded, dest.display());
    Ok(downloaded)
}
