//! Public file links on the hosted provider (mega.nz).
//!
//! A link carries the file handle and its key, either as
//! `https://mega.nz/file/<handle>#<key>` or the older
//! `https://mega.nz/#!<handle>!<key>`. The provider API turns the handle into
//! a temporary download URL. The body served there is AES-128-CTR encrypted
//! with a key and nonce folded out of the 32-byte link key, so it is
//! decrypted chunk by chunk while streaming to disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use aes::Aes128;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ctr::cipher::{KeyIvInit, StreamCipher};
use serde::Deserialize;

use crate::error::DownloadError;
use crate::fetch::{DownloadKind, HostedProvider, HttpTransport};

pub const DEFAULT_API_URL: &str = "https://g.api.mega.co.nz/cs";
const DOWNLOAD_NAME: &str = "hosted_download.part";

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Handle and key of a public file link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLink {
    pub handle: String,
    key: [u8; 32],
}

impl FileLink {
    pub fn parse(url: &str) -> Result<Self, DownloadError> {
        let invalid = || DownloadError::Provider(format!("not a public file link: {}", url));
        if url.contains("/folder/") || url.contains("#F!") {
            return Err(DownloadError::Provider(format!(
                "folder links are not supported: {}",
                url
            )));
        }

        let (handle, key) = if let Some((_, rest)) = url.split_once("/file/") {
            rest.split_once('#').ok_or_else(invalid)?
        } else if let Some((_, rest)) = url.split_once("#!") {
            rest.split_once('!').ok_or_else(invalid)?
        } else {
            return Err(invalid());
        };
        // links shared from the web app may carry a trailing path or query
        let key = key.split(['/', '?']).next().unwrap_or_default();
        if handle.is_empty() {
            return Err(invalid());
        }

        let raw = URL_SAFE_NO_PAD
            .decode(key)
            .map_err(|e| DownloadError::Provider(format!("bad key in {}: {}", url, e)))?;
        let key: [u8; 32] = raw.try_into().map_err(|raw: Vec<u8>| {
            DownloadError::Provider(format!("key in {} is {} bytes, expected 32", url, raw.len()))
        })?;
        Ok(Self {
            handle: handle.to_string(),
            key,
        })
    }

    fn cipher_key(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.key[i] ^ self.key[i + 16];
        }
        out
    }

    fn nonce(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.key[16..24]);
        out
    }

    fn cipher(&self) -> Aes128Ctr {
        let key = self.cipher_key();
        let nonce = self.nonce();
        Aes128Ctr::new(&key.into(), &nonce.into())
    }
}

#[derive(Debug, Deserialize)]
struct DownloadTicket {
    /// Temporary download URL.
    g: String,
    /// Size of the file in bytes.
    #[serde(default)]
    s: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reply {
    Ticket(DownloadTicket),
    Code(i64),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    Batch(Vec<Reply>),
    Code(i64),
}

fn api_error(code: i64, handle: &str) -> DownloadError {
    let reason = match code {
        -9 => "file not found",
        -11 => "access denied",
        -16 => "file blocked",
        -17 | -4 => "transfer quota exceeded",
        -3 => "server busy, try again",
        _ => "request rejected",
    };
    DownloadError::Provider(format!("{} (API error {}) for {}", reason, code, handle))
}

impl ApiResponse {
    fn into_ticket(self, handle: &str) -> Result<DownloadTicket, DownloadError> {
        match self {
            ApiResponse::Batch(replies) => match replies.into_iter().next() {
                Some(Reply::Ticket(ticket)) => Ok(ticket),
                Some(Reply::Code(code)) => Err(api_error(code, handle)),
                None => Err(DownloadError::Provider(format!(
                    "empty API reply for {}",
                    handle
                ))),
            },
            ApiResponse::Code(code) => Err(api_error(code, handle)),
        }
    }
}

async fn request_ticket(
    client: &reqwest::Client,
    api_url: &str,
    handle: &str,
    timeout: Duration,
) -> Result<DownloadTicket, DownloadError> {
    let url = format!("{}?id={}", api_url, SEQUENCE.fetch_add(1, Ordering::Relaxed));
    let response = client
        .post(&url)
        .json(&serde_json::json!([{ "a": "g", "g": 1, "p": handle }]))
        .timeout(timeout)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url,
            status: response.status().as_u16(),
        });
    }
    response.json::<ApiResponse>().await?.into_ticket(handle)
}

/// Downloads public file links straight from the provider.
#[derive(Debug, Clone)]
pub struct MegaProvider {
    api_url: String,
}

impl Default for MegaProvider {
    fn default() -> Self {
        Self::with_api_url(DEFAULT_API_URL)
    }
}

impl MegaProvider {
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }
}

impl HostedProvider for MegaProvider {
    fn fetch_into(
        &self,
        transport: &HttpTransport,
        url: &str,
        dir: &Path,
        kind: DownloadKind,
    ) -> Result<PathBuf, DownloadError> {
        let link = FileLink::parse(url)?;
        let ticket = transport.block_on(request_ticket(
            transport.client(),
            &self.api_url,
            &link.handle,
            kind.stall_timeout(),
        ))?;
        tracing::info!(
            "hosted file {} resolved ({} bytes)",
            link.handle,
            ticket.s.map_or_else(|| "unknown".to_string(), |s| s.to_string())
        );

        let target = dir.join(DOWNLOAD_NAME);
        let mut cipher = link.cipher();
        let written = transport.stream_transformed(
            &ticket.g,
            &target,
            kind,
            &mut |chunk: &mut [u8]| cipher.apply_keystream(chunk),
        )?;
        if let Some(size) = ticket.s {
            if written != size {
                return Err(DownloadError::Provider(format!(
                    "{} ended after {} of {} bytes",
                    link.handle, written, size
                )));
            }
        }
        Ok(target)
    }
}
