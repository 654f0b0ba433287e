//! Streaming extraction API: a preview after every snapshot, then the document.
//!
//! [`extract_stream`] resolves and normalises the image, starts the
//! recognition call, and returns a [`SessionStream`] immediately. Callers
//! display each [`SessionUpdate::Preview`] as it arrives; the final
//! [`SessionUpdate::Completed`] carries the written document. Dropping the
//! stream early cancels the recognition call and writes nothing.

use crate::error::Flyer2MdError;
use crate::pipeline::{encode, input, llm, normalize};
use crate::recognition::RecognitionStream;
use crate::replay;
use crate::session::{run_session, SessionContext, SessionStream};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Extract a flyer from a local image or URL, streaming previews.
///
/// # Example
/// ```rust,no_run
/// use edgequake_flyer2md::{extract_stream, SessionContext, SessionUpdate};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = Arc::new(SessionContext::default());
/// let mut updates = extract_stream("flyer.jpg", &ctx).await?;
/// while let Some(update) = updates.next().await {
///     match update? {
///         SessionUpdate::Preview { markdown, .. } => println!("{markdown}"),
///         SessionUpdate::Completed(done) => println!("→ {}", done.document.path.display()),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract_stream(
    input_str: impl AsRef<str>,
    ctx: &Arc<SessionContext>,
) -> Result<SessionStream, Flyer2MdError> {
    let (events, _normalized) = prepare_recognition(input_str.as_ref(), ctx).await?;
    Ok(run_session(Arc::clone(ctx), events))
}

/// Replay a finished transcript through a session, line by line.
///
/// No image and no provider are involved; useful for re-rendering a saved
/// model answer with a different template.
pub fn extract_stream_from_text(text: &str, ctx: &Arc<SessionContext>) -> SessionStream {
    run_session(Arc::clone(ctx), replay::replay_stream(text))
}

/// Resolve input, normalise, encode, and start recognition.
///
/// Returns the recognition stream and the normalised image path, if one was
/// written.
pub(crate) async fn prepare_recognition(
    input_str: &str,
    ctx: &SessionContext,
) -> Result<(RecognitionStream, Option<PathBuf>), Flyer2MdError> {
    let config = &ctx.config;
    info!("Starting extraction: {}", input_str);

    // ── Resolve input ────────────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // ── Get provider (fail before touching the output directory) ─────────
    let provider = llm::resolve_provider(config)?;

    // ── Normalise ────────────────────────────────────────────────────────
    let normalized = if config.normalize_image {
        Some(normalize::normalize(resolved.path(), config).await?)
    } else {
        None
    };
    let image_path = normalized
        .clone()
        .unwrap_or_else(|| resolved.path().to_path_buf());

    // ── Encode ───────────────────────────────────────────────────────────
    // The image is fully in memory after this, so a downloaded temp file
    // may be dropped with `resolved`.
    let image = encode::encode_file(&image_path).await?;

    let events = llm::recognition_stream(provider, image, ctx.prompt(), config.clone());
    Ok((events, normalized))
}
