//! Input resolution: normalise a user-supplied path or URL to a local image.
//!
//! A URL is downloaded into a `TempDir` that lives as long as the
//! [`ResolvedInput`], so the image is cleaned up automatically once the
//! session is done with it. The format is sniffed from magic bytes before
//! returning so callers get a meaningful error instead of a decoder failure
//! deep inside normalisation.

use crate::error::Flyer2MdError;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input — either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; image downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the image regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local image path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Flyer2MdError> {
    if input.trim().is_empty() {
        return Err(Flyer2MdError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Sniff the image format from its leading bytes; only PNG and JPEG pass.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(fmt @ (ImageFormat::Png | ImageFormat::Jpeg)) => Some(fmt),
        _ => None,
    }
}

fn magic_of(bytes: &[u8]) -> [u8; 4] {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    magic
}

/// Resolve a local file path, validating existence and image magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, Flyer2MdError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Flyer2MdError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut head = [0u8; 16];
            let n = f.read(&mut head).unwrap_or(0);
            if sniff_format(&head[..n]).is_none() {
                return Err(Flyer2MdError::NotAnImage {
                    path,
                    magic: magic_of(&head[..n]),
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Flyer2MdError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Flyer2MdError::FileNotFound { path });
        }
    }

    debug!("Resolved local image: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Flyer2MdError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Flyer2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Flyer2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Flyer2MdError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Flyer2MdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Flyer2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let format = sniff_format(&bytes);
    let filename = extract_filename(url, format);
    let temp_dir = TempDir::new().map_err(|e| Flyer2MdError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    if format.is_none() {
        return Err(Flyer2MdError::NotAnImage {
            path: file_path,
            magic: magic_of(&bytes),
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Flyer2MdError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Derive a filename from the URL path, falling back to the sniffed format.
fn extract_filename(url: &str, format: Option<ImageFormat>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    match format {
        Some(ImageFormat::Jpeg) => "downloaded.jpg".to_string(),
        _ => "downloaded.png".to_string(),
    }
}
