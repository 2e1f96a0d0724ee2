//! File retrieval for extraction and update results

use reqwest::header::HeaderMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::utils::file_name_from_uri;

/// Download every URI into `target_dir`, in order
///
/// The directory is created if it does not exist. Each file is named after
/// the last path segment of its URI. The first failure aborts the batch;
/// files already written are left in place.
///
/// Returns the local paths of the written files.
pub async fn download_all(
    http: &reqwest::Client,
    headers: &HeaderMap,
    uris: &[String],
    target_dir: &Path,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(target_dir).await?;

    let mut written = Vec::with_capacity(uris.len());
    for uri in uris {
        let path = target_dir.join(file_name_from_uri(uri));
        let bytes = download_one(http, headers, uri, &path).await?;
        tracing::debug!(uri = %uri, path = %path.display(), bytes, "file downloaded");
        written.push(path);
    }

    tracing::info!(
        count = written.len(),
        dir = %target_dir.display(),
        "job files downloaded"
    );
    Ok(written)
}

async fn download_one(
    http: &reqwest::Client,
    headers: &HeaderMap,
    uri: &str,
    path: &Path,
) -> Result<u64> {
    let download_error = |reason: String| Error::Download {
        uri: uri.to_string(),
        reason,
    };

    let mut response = http
        .get(uri)
        .headers(headers.clone())
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                download_error("request timed out".to_string())
            } else if e.is_connect() {
                download_error(format!("connection failed: {e}"))
            } else {
                download_error(e.to_string())
            }
        })?;

    if !response.status().is_success() {
        return Err(download_error(format!("HTTP {}", response.status())));
    }

    let mut file = tokio::fs::File::create(path).await?;
    let mut total = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| download_error(format!("failed to read body: {e}")))?
    {
        file.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(total)
}
