use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::app::ports::HttpClientPort;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::types::{ArchiveHandle, DownloadedArchive};

/// Downloads each archive into `dest_dir` as `<Q>T<YYYY>.zip`. Failures are
/// logged and skipped; the result keeps handle order.
#[instrument(skip(http, handles), fields(count = handles.len(), dest = %dest_dir.display()))]
pub async fn download_archives(
    http: &dyn HttpClientPort,
    handles: &[ArchiveHandle],
    dest_dir: &Path,
) -> Result<Vec<DownloadedArchive>> {
    tokio::fs::create_dir_all(dest_dir).await?;

    let mut downloaded = Vec::with_capacity(handles.len());
    for handle in handles {
        let path = dest_dir.join(handle.period.archive_name());
        match fetch_to(http, &handle.url, &path).await {
            Ok(bytes) => {
                info!("Downloaded {} -> {} ({} bytes)", handle.url, path.display(), bytes);
                metrics::ingest::archive_downloaded(bytes);
                downloaded.push(DownloadedArchive { path, period: handle.period });
            }
            Err(e) => {
                warn!("Failed to download {}: {}", handle.url, e);
                metrics::ingest::archive_failed("download");
            }
        }
    }
    Ok(downloaded)
}

/// Downloads the provider registry to `dest`. With `reuse_existing` an
/// existing local copy is returned untouched. Failures yield `None`.
#[instrument(skip(http), fields(dest = %dest.display()))]
pub async fn fetch_registry(http: &dyn HttpClientPort, url: &str, dest: &Path, reuse_existing: bool) -> Option<PathBuf> {
    if reuse_existing && dest.exists() {
        info!("Reusing registry at {}", dest.display());
        return Some(dest.to_path_buf());
    }
    if let Some(parent) = dest.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!("Cannot create {}: {}", parent.display(), e);
            return None;
        }
    }
    match fetch_to(http, url, dest).await {
        Ok(bytes) => {
            info!("Registry downloaded ({} bytes)", bytes);
            Some(dest.to_path_buf())
        }
        Err(e) => {
            warn!("Registry download from {} failed, continuing without enrichment: {}", url, e);
            None
        }
    }
}

async fn fetch_to(http: &dyn HttpClientPort, url: &str, path: &Path) -> Result<usize> {
    let response = http.get(url).await?;
    if !response.is_success() {
        return Err(PipelineError::DownloadStatus { url: url.to_string(), status: response.status });
    }
    tokio::fs::write(path, &response.bytes).await?;
    Ok(response.bytes.len())
}
