//! Result types produced by an extraction session.

use crate::record::Record;
use serde::Serialize;
use std::path::PathBuf;

/// The persisted, template-rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDocument {
    /// Timestamp-named file the document was written to.
    pub path: PathBuf,
    /// Rendered Markdown, identical to the file contents.
    pub markdown: String,
    /// Placeholders left verbatim because no record key filled them.
    pub unresolved: Vec<String>,
}

/// Final state of a session that reached the end-of-stream signal.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    /// Record parsed from the final snapshot.
    pub record: Record,
    /// Preview of the final record.
    pub preview: String,
    pub document: RenderedDocument,
    /// Number of snapshots observed, the final one included.
    pub snapshots: usize,
}

/// Aggregate statistics for one extraction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    /// Snapshots observed, the final one included.
    pub snapshots: usize,
    /// Fields in the final record.
    pub fields: usize,
    /// Wall-clock time from input resolution to document write.
    pub duration_ms: u64,
    /// Normalised image written to the output directory, when normalisation ran.
    pub normalized_image: Option<PathBuf>,
}

/// Everything an eager extraction returns.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    pub record: Record,
    pub preview: String,
    pub document: RenderedDocument,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    pub(crate) fn from_completion(
        completion: Completion,
        duration_ms: u64,
        normalized_image: Option<PathBuf>,
    ) -> Self {
        let stats = ExtractionStats {
            snapshots: completion.snapshots,
            fields: completion.record.len(),
            duration_ms,
            normalized_image,
        };
        Self {
            record: completion.record,
            preview: completion.preview,
            document: completion.document,
            stats,
        }
    }
}
