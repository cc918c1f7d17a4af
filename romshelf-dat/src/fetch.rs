//! Catalog download over HTTP.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DatError;

/// A catalog downloaded to a temporary file, not yet registered.
#[derive(Debug, Clone)]
pub struct DownloadedCatalog {
    pub path: PathBuf,
    /// File name suggested by the URL.
    pub filename: String,
}

/// Download `url` into `dest_dir` with a bounded overall timeout.
///
/// The body is streamed to disk. On any failure the partial file is removed.
pub fn fetch_catalog(
    url: &str,
    dest_dir: &Path,
    timeout: Duration,
) -> Result<DownloadedCatalog, DatError> {
    fs::create_dir_all(dest_dir)?;
    let filename = filename_from_url(url);
    let path = dest_dir.join(format!(".download-{}-{}", std::process::id(), filename));

    log::info!("Downloading {}", url);
    let result = download_to(url, &path, timeout);
    if let Err(e) = result {
        let _ = fs::remove_file(&path);
        return Err(e);
    }

    Ok(DownloadedCatalog { path, filename })
}

fn download_to(url: &str, path: &Path, timeout: Duration) -> Result<(), DatError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DatError::download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| DatError::download(format!("{url}: {e}")))?;

    if !response.status().is_success() {
        return Err(DatError::download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let mut file = File::create(path)?;
    response
        .copy_to(&mut file)
        .map_err(|e| DatError::download(format!("{url}: {e}")))?;
    Ok(())
}

/// Last path segment of a URL, without query or fragment.
pub fn filename_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let rest = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let path = rest.split_once('/').map_or("", |(_, path)| path);
    let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    if segment.is_empty() {
        "catalog.dat".to_string()
    } else {
        segment.to_string()
    }
}
