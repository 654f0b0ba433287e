//! Error types for the edgequake-flyer2md library.
//!
//! Only *fatal* conditions live here. The two soft failures of the
//! extraction pipeline are deliberately not errors:
//!
//! * a malformed snapshot line (no `:` separator) is skipped by the parser;
//! * a field missing at render time leaves its `{{placeholder}}` verbatim, or
//!   shows as pending in the preview.
//!
//! Everything in [`Flyer2MdError`] ends a single extraction session. Other
//! sessions running in the same process are unaffected because no session
//! shares mutable state with another.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-flyer2md library.
#[derive(Debug, Error)]
pub enum Flyer2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input image was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PNG or JPEG image.
    #[error("File is not a supported image (PNG or JPEG): '{path}'\nFirst bytes: {magic:?}")]
    NotAnImage { path: PathBuf, magic: [u8; 4] },

    // ── Image errors ──────────────────────────────────────────────────────
    /// Decoding, resizing, or saving the normalised image failed.
    #[error("Image normalisation failed for '{path}': {detail}")]
    NormalizationFailed { path: PathBuf, detail: String },

    // ── Recognition errors ────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The recognition call failed after all retries.
    #[error("Recognition failed after {retries} retries: {detail}")]
    RecognitionFailed { retries: u32, detail: String },

    /// A single recognition call exceeded the per-call timeout.
    #[error("Recognition call timed out after {secs}s")]
    RecognitionTimeout { secs: u64 },

    /// The snapshot stream closed without the end-of-stream signal.
    ///
    /// Treated like an abandoned session: nothing is rendered or written.
    #[error("Recognition stream ended after {snapshots} snapshot(s) without completing")]
    StreamIncomplete { snapshots: usize },

    // ── Template & schema errors ──────────────────────────────────────────
    /// The template file could not be read.
    #[error("Failed to read template '{path}': {source}")]
    TemplateReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The field schema file could not be read or parsed.
    #[error("Invalid field schema '{origin}': {detail}")]
    InvalidSchema { origin: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the rendered document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_incomplete_display() {
        let e = Flyer2MdError::StreamIncomplete { snapshots: 4 };
        assert!(e.to_string().contains("4 snapshot"), "got: {e}");
    }

    #[test]
    fn recognition_failed_display() {
        let e = Flyer2MdError::RecognitionFailed {
            retries: 3,
            detail: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 retries"));
        assert!(msg.contains("HTTP 503"));
    }

    #[test]
    fn output_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = Flyer2MdError::OutputWriteFailed {
            path: PathBuf::from("output/2024-01-01-00-00-00.md"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(e.to_string().contains("disk full"));
        assert!(e.source().is_some());
    }

    #[test]
    fn invalid_schema_display() {
        let e = Flyer2MdError::InvalidSchema {
            origin: "schema.json".into(),
            detail: "duplicate key 'bio'".into(),
        };
        assert!(e.to_string().contains("schema.json"));
        assert!(e.to_string().contains("duplicate key"));
    }
}
