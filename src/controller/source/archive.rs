//! # Archive Download and Extraction
//!
//! Fetches a repository snapshot from the codeload endpoint and extracts
//! the entries under a configured path prefix.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use reqwest::header::AUTHORIZATION;
use tracing::{debug, info};

use crate::controller::reconciler::ReconcileError;

/// Codeload URL for a repository snapshot at a given revision
#[must_use]
pub fn zip_url(org: &str, repo: &str, commit: &str) -> String {
    format!("https://codeload.github.com/{org}/{repo}/zip/{commit}")
}

/// Download the ZIP snapshot, authenticating when a token is present.
///
/// Any non-2xx response is a `SourceUnavailable` failure: the revision may
/// not exist yet, or the archive server may be down, and both deserve a
/// backed-off retry.
pub async fn download_zip(
    http: &reqwest::Client,
    org: &str,
    repo: &str,
    commit: &str,
    token: &str,
) -> Result<Vec<u8>, ReconcileError> {
    let url = zip_url(org, repo, commit);
    debug!("Downloading archive from {}", url);

    let mut request = http.get(&url);
    if !token.is_empty() {
        request = request.header(AUTHORIZATION, format!("token {token}"));
    }

    let response = request
        .send()
        .await
        .map_err(|e| ReconcileError::SourceUnavailable(format!("failed to download {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(ReconcileError::SourceUnavailable(format!(
            "archive download failed: status {} from {url}",
            response.status().as_u16()
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ReconcileError::SourceUnavailable(format!("failed to read archive body: {e}")))?;

    if body.is_empty() {
        return Err(ReconcileError::SourceUnavailable(
            "downloaded archive is empty".to_string(),
        ));
    }

    info!(size = body.len(), "Downloaded archive from {}", url);
    Ok(body.to_vec())
}

/// Extract files under `target_path` from the archive.
///
/// The first entry names the archive root directory; its prefix is stripped
/// from every later entry before the path filter applies. Directory entries
/// are skipped. Keys are entry basenames, still percent-encoded.
pub fn extract_entries(
    zip_data: &[u8],
    target_path: &str,
) -> Result<BTreeMap<String, Vec<u8>>, ReconcileError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_data))
        .map_err(|e| ReconcileError::SourceUnavailable(format!("failed to read zip: {e}")))?;

    let mut files = BTreeMap::new();
    let mut root_dir = String::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| {
            ReconcileError::SourceUnavailable(format!("failed to open zip entry {index}: {e}"))
        })?;

        // First entry is the archive root directory
        if index == 0 {
            if entry.is_dir() {
                root_dir = entry.name().to_string();
            }
            continue;
        }

        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let relative = name.strip_prefix(root_dir.as_str()).unwrap_or(&name);
        if !relative.starts_with(target_path) {
            continue;
        }

        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content).map_err(|e| {
            ReconcileError::SourceUnavailable(format!("failed to read zip entry {name}: {e}"))
        })?;

        let basename = relative.rsplit('/').next().unwrap_or(relative).to_string();
        files.insert(basename, content);
    }

    Ok(files)
}
