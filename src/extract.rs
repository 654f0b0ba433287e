//! Eager (whole-session) extraction entry points.
//!
//! These wait for the end-of-stream signal and return the final record,
//! preview and written document in one [`ExtractionOutput`]. Use
//! [`crate::stream::extract_stream`] instead to show previews while the
//! recognition service is still producing text.

use crate::error::Flyer2MdError;
use crate::output::{Completion, ExtractionOutput};
use crate::session::{run_session, SessionContext, SessionStream, SessionUpdate};
use crate::stream::{extract_stream_from_text, prepare_recognition};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Extract a flyer from a local image path or HTTP/HTTPS URL.
///
/// # Errors
/// Returns `Err(Flyer2MdError)` when the input cannot be resolved, the
/// provider is not configured, recognition fails, or the document cannot be
/// written. Missing fields are not errors: their placeholders stay verbatim
/// (see `output.document.unresolved`).
pub async fn extract(
    input_str: impl AsRef<str>,
    ctx: &Arc<SessionContext>,
) -> Result<ExtractionOutput, Flyer2MdError> {
    let start = Instant::now();
    let (events, normalized) = prepare_recognition(input_str.as_ref(), ctx).await?;
    let completion = complete(run_session(Arc::clone(ctx), events)).await?;
    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} fields in {}ms → {}",
        completion.record.len(),
        duration_ms,
        completion.document.path.display()
    );
    Ok(ExtractionOutput::from_completion(completion, duration_ms, normalized))
}

/// Run a saved transcript through a session and write the document.
pub async fn extract_from_text(
    text: &str,
    ctx: &Arc<SessionContext>,
) -> Result<ExtractionOutput, Flyer2MdError> {
    let start = Instant::now();
    let completion = complete(extract_stream_from_text(text, ctx)).await?;
    Ok(ExtractionOutput::from_completion(
        completion,
        start.elapsed().as_millis() as u64,
        None,
    ))
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    ctx: &Arc<SessionContext>,
) -> Result<ExtractionOutput, Flyer2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Flyer2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, ctx))
}

/// Drain a session stream, keeping only the completion.
async fn complete(mut updates: SessionStream) -> Result<Completion, Flyer2MdError> {
    while let Some(update) = updates.next().await {
        match update? {
            SessionUpdate::Preview { step, record, .. } => {
                debug!("Preview {}: {} fields", step, record.len());
            }
            SessionUpdate::Completed(done) => return Ok(done),
        }
    }
    Err(Flyer2MdError::Internal(
        "session closed without a result".into(),
    ))
}
