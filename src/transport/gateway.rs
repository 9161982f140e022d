//! Public-read gateway: downloads and size lookups
//!
//! A directory CID requested without a format comes back as an HTML
//! listing, not content. Downloads therefore probe first and ask for a
//! tar archive for directories; an HTML answer to a raw request is taken
//! as a directory too and retried as tar.

use std::fs;
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{TransportError, TransportResult};
use super::records::value_as_u64;
use crate::observability::{log_event_with_fields, Event};

/// What a download produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    pub kind: DownloadKind,
    /// Bytes of file content written
    pub bytes: u64,
}

/// Result of a HEAD probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub is_directory: bool,
    pub content_length: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Gateway {
    base_url: String,
    http: Client,
}

impl Gateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> TransportResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.base_url, cid)
    }

    /// HEAD the object; an HTML content type means a directory
    pub async fn probe(&self, cid: &str) -> TransportResult<Probe> {
        let response = self.http.head(self.url(cid)).send().await?;
        let response = check_gateway_status(response)?;
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        Ok(Probe {
            is_directory: is_html(&response),
            content_length,
        })
    }

    /// Fetch a CID into `dest`.
    ///
    /// Files are written to `dest` itself; directories are extracted with
    /// `dest` as their root.
    pub async fn download(&self, cid: &str, dest: &Path) -> TransportResult<Download> {
        if self.probe(cid).await?.is_directory {
            return self.download_tar(cid, dest).await;
        }

        let response = self.http.get(self.url(cid)).send().await?;
        let response = check_gateway_status(response)?;
        if is_html(&response) {
            log_event_with_fields(Event::GatewayTarFallback, &[("cid", cid)]);
            return self.download_tar(cid, dest).await;
        }

        let data = response.bytes().await?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TransportError::local_io(parent, e))?;
        }
        fs::write(dest, &data).map_err(|e| TransportError::local_io(dest, e))?;
        Ok(Download {
            kind: DownloadKind::File,
            bytes: data.len() as u64,
        })
    }

    async fn download_tar(&self, cid: &str, dest: &Path) -> TransportResult<Download> {
        let response = self
            .http
            .get(self.url(cid))
            .query(&[("format", "tar")])
            .send()
            .await?;
        let response = check_gateway_status(response)?;
        if is_html(&response) {
            return Err(TransportError::InvalidResponseShape(format!(
                "gateway returned HTML for tar request of {}",
                cid
            )));
        }
        let data = response.bytes().await?;
        extract_tar(&data, dest)
    }

    /// Total size of a CID's content.
    ///
    /// Sums `Tsize` over the DAG's top-level links; objects without links
    /// (small files, raw leaves) fall back to the HEAD content length.
    pub async fn dag_size(&self, cid: &str) -> TransportResult<u64> {
        match self.linked_size(cid).await {
            Ok(Some(size)) => return Ok(size),
            Ok(None) => {}
            Err(TransportError::ClusterReported { .. })
            | Err(TransportError::InvalidResponseShape(_)) => {}
            Err(other) => return Err(other),
        }

        self.probe(cid).await?.content_length.ok_or_else(|| {
            TransportError::InvalidResponseShape(format!("no size available for {}", cid))
        })
    }

    async fn linked_size(&self, cid: &str) -> TransportResult<Option<u64>> {
        let response = self
            .http
            .get(self.url(cid))
            .query(&[("format", "dag-json")])
            .send()
            .await?;
        let response = check_gateway_status(response)?;
        let text = response.text().await?;
        let node: Value = serde_json::from_str(&text)
            .map_err(|e| TransportError::InvalidResponseShape(e.to_string()))?;

        let links = match node.get("Links").and_then(Value::as_array) {
            Some(links) if !links.is_empty() => links,
            _ => return Ok(None),
        };
        Ok(Some(
            links
                .iter()
                .filter_map(|l| l.get("Tsize").and_then(value_as_u64))
                .sum(),
        ))
    }
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false)
}

fn check_gateway_status(response: Response) -> TransportResult<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(TransportError::Unauthorized);
    }
    if !status.is_success() {
        return Err(TransportError::cluster(
            format!("gateway returned {}", status),
            i64::from(status.as_u16()),
        ));
    }
    Ok(response)
}

/// Path of an archive entry with the top-level CID component removed.
/// Rejects absolute paths and `..`.
fn strip_root(entry_path: &Path) -> TransportResult<PathBuf> {
    let mut components = entry_path
        .components()
        .filter(|c| !matches!(c, Component::CurDir));

    match components.next() {
        Some(Component::Normal(_)) => {}
        _ => return Err(unsafe_entry(entry_path)),
    }

    let mut relative = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => relative.push(part),
            _ => return Err(unsafe_entry(entry_path)),
        }
    }
    Ok(relative)
}

fn unsafe_entry(entry_path: &Path) -> TransportError {
    TransportError::InvalidResponseShape(format!(
        "unsafe path in archive: {}",
        entry_path.display()
    ))
}

fn extract_tar(data: &[u8], dest: &Path) -> TransportResult<Download> {
    let io_err = |e: io::Error| TransportError::local_io(dest, e);

    let mut archive = tar::Archive::new(Cursor::new(data));
    let mut kind = DownloadKind::File;
    let mut bytes = 0u64;

    for entry in archive.entries().map_err(io_err)? {
        let mut entry = entry.map_err(io_err)?;
        let entry_path = entry.path().map_err(io_err)?.into_owned();
        let relative = strip_root(&entry_path)?;
        let target = if relative.as_os_str().is_empty() {
            dest.to_path_buf()
        } else {
            kind = DownloadKind::Directory;
            dest.join(&relative)
        };

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            kind = DownloadKind::Directory;
            fs::create_dir_all(&target).map_err(|e| TransportError::local_io(&target, e))?;
        } else if entry_type.is_file() {
            if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| TransportError::local_io(parent, e))?;
            }
            let mut file =
                fs::File::create(&target).map_err(|e| TransportError::local_io(&target, e))?;
            bytes += io::copy(&mut entry, &mut file)
                .map_err(|e| TransportError::local_io(&target, e))?;
        }
    }

    Ok(Download { kind, bytes })
}
