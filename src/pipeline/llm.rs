//! VLM interaction: send the flyer image and prompt, get the transcript back.
//!
//! This is the boundary with the external recognition service. It owns the
//! provider selection, the per-call timeout and the retry policy; everything
//! downstream only sees a [`RecognitionStream`].
//!
//! ## Streaming
//!
//! Providers that report `supports_streaming()` are read chunk by chunk: the
//! content deltas are appended to one growing transcript and every chunk
//! yields a snapshot of the *whole* text so far, so the session can refresh
//! its preview while the model is still writing. Other providers (or ones
//! that turn out not to implement streaming) get a single `chat` call whose
//! answer becomes one snapshot followed by `Done`.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`, capped at [`MAX_BACKOFF_MS`]) gives
//! 500 ms → 1 s → 2 s with defaults. A streaming call is only retried while
//! opening; once text has been emitted a failure ends the stream.

use crate::config::ExtractionConfig;
use crate::error::Flyer2MdError;
use crate::recognition::{RecognitionEvent, RecognitionStream};
use edgequake_llm::traits::StreamChunk;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError, ProviderFactory,
};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Upper bound on a single retry delay.
pub const MAX_BACKOFF_MS: u64 = 30_000;

type EventSender = mpsc::Sender<Result<RecognitionEvent, Flyer2MdError>>;

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Ask the VLM to transcribe the flyer into `key: value` lines.
///
/// Transient failures are retried up to `config.max_retries` times.
pub async fn recognize(
    provider: &Arc<dyn LLMProvider>,
    image_data: ImageData,
    prompt: &str,
    config: &ExtractionConfig,
) -> Result<String, Flyer2MdError> {
    let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];
    chat_with_retry(provider, &messages, config).await
}

async fn chat_with_retry(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    config: &ExtractionConfig,
) -> Result<String, Flyer2MdError> {
    let start = Instant::now();
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<Flyer2MdError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Recognition: retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(messages, Some(&options))).await {
            Ok(Ok(response)) => {
                debug!(
                    "Recognition: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(response.content);
            }
            Ok(Err(e)) => {
                warn!("Recognition: attempt {} failed — {}", attempt + 1, e);
                last_err = Some(Flyer2MdError::RecognitionFailed {
                    retries: attempt,
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    "Recognition: attempt {} timed out after {}s",
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(Flyer2MdError::RecognitionTimeout {
                    secs: config.api_timeout_secs,
                });
            }
        }
    }

    Err(match last_err {
        Some(Flyer2MdError::RecognitionFailed { detail, .. }) => Flyer2MdError::RecognitionFailed {
            retries: config.max_retries,
            detail,
        },
        Some(other) => other,
        None => Flyer2MdError::Internal("recognition loop did not run".into()),
    })
}

/// Start recognition on a background task and return its event stream.
///
/// Streams cumulative snapshots when the provider can, otherwise emits the
/// single `chat` answer as one snapshot. Either way the stream ends with
/// `Done` carrying the full text, or with one `Err`. Dropping the stream
/// abandons the provider call.
///
/// Must be called from within a Tokio runtime.
pub fn recognition_stream(
    provider: Arc<dyn LLMProvider>,
    image_data: ImageData,
    prompt: String,
    config: ExtractionConfig,
) -> RecognitionStream {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let messages = vec![ChatMessage::user_with_images(&prompt, vec![image_data])];
        tokio::select! {
            _ = tx.closed() => debug!("Recognition abandoned by consumer"),
            _ = produce(&provider, &messages, &config, &tx) => {}
        }
    });
    Box::pin(ReceiverStream::new(rx))
}

async fn produce(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    config: &ExtractionConfig,
    tx: &EventSender,
) {
    if provider.supports_streaming() {
        match stream_snapshots(provider, messages, config, tx).await {
            Ok(true) => return,
            Ok(false) => debug!("Provider {} does not stream; falling back to chat", provider.name()),
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }

    let events = match chat_with_retry(provider, messages, config).await {
        Ok(text) => vec![
            Ok(RecognitionEvent::Snapshot(text.clone())),
            Ok(RecognitionEvent::Done(text)),
        ],
        Err(e) => vec![Err(e)],
    };
    for event in events {
        if tx.send(event).await.is_err() {
            return;
        }
    }
}

/// Forward a streaming answer as cumulative snapshots.
///
/// Returns `Ok(false)` when the provider rejects streaming, so the caller can
/// fall back to a plain call.
async fn stream_snapshots(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    config: &ExtractionConfig,
    tx: &EventSender,
) -> Result<bool, Flyer2MdError> {
    let start = Instant::now();
    let Some(mut chunks) = open_stream(provider, messages, config).await? else {
        return Ok(false);
    };
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut text = String::new();
    let mut deltas = 0usize;
    loop {
        let next = timeout(call_timeout, chunks.next())
            .await
            .map_err(|_| Flyer2MdError::RecognitionTimeout {
                secs: config.api_timeout_secs,
            })?;
        match next {
            Some(Ok(StreamChunk::Content(delta))) => {
                if delta.is_empty() {
                    continue;
                }
                deltas += 1;
                text.push_str(&delta);
                if tx.send(Ok(RecognitionEvent::Snapshot(text.clone()))).await.is_err() {
                    return Ok(true);
                }
            }
            Some(Ok(StreamChunk::Finished { reason, .. })) => {
                debug!("Recognition stream finished: {}", reason);
                break;
            }
            // Reasoning text and tool deltas are not part of the transcript.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("Recognition stream failed after {} chunks — {}", deltas, e);
                return Err(Flyer2MdError::RecognitionFailed {
                    retries: 0,
                    detail: e.to_string(),
                });
            }
            None => break,
        }
    }

    debug!(
        "Recognition: streamed {} chunks, {} bytes, {:?}",
        deltas,
        text.len(),
        start.elapsed()
    );
    let _ = tx.send(Ok(RecognitionEvent::Done(text))).await;
    Ok(true)
}

/// Open the provider stream, retrying transient failures.
///
/// `Ok(None)` means the provider does not implement streaming.
async fn open_stream(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    config: &ExtractionConfig,
) -> Result<Option<BoxStream<'static, edgequake_llm::Result<StreamChunk>>>, Flyer2MdError> {
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<Flyer2MdError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Recognition: stream retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let opened = timeout(
            call_timeout,
            provider.chat_with_tools_stream(messages, &[], None, Some(&options)),
        )
        .await;
        match opened {
            Ok(Ok(chunks)) => return Ok(Some(chunks)),
            Ok(Err(LlmError::NotSupported(_))) => return Ok(None),
            Ok(Err(e)) => {
                warn!("Recognition: stream attempt {} failed — {}", attempt + 1, e);
                last_err = Some(Flyer2MdError::RecognitionFailed {
                    retries: config.max_retries,
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                last_err = Some(Flyer2MdError::RecognitionTimeout {
                    secs: config.api_timeout_secs,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Flyer2MdError::Internal("stream open loop did not run".into())))
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the LLM provider from config, then environment.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, Flyer2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    // Honour EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL when both set
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _) =
        ProviderFactory::from_env().map_err(|e| Flyer2MdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!("No LLM provider auto-detected: {}", e),
        })?;

    info!("Using auto-detected LLM provider");
    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Flyer2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Flyer2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::RecognitionEvent::{Done, Snapshot};
    use edgequake_llm::{LLMResponse, MockProvider, ToolChoice, ToolDefinition};
    use futures::stream;

    /// Provider that streams a fixed list of content deltas.
    struct ChunkedProvider {
        deltas: Vec<&'static str>,
    }

    #[async_trait::async_trait]
    impl LLMProvider for ChunkedProvider {
        fn name(&self) -> &str {
            "chunked"
        }

        fn model(&self) -> &str {
            "chunked-vlm"
        }

        fn max_context_length(&self) -> usize {
            8192
        }

        async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            Err(LlmError::NotSupported("complete".into()))
        }

        async fn complete_with_options(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            Err(LlmError::NotSupported("complete".into()))
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            Ok(LLMResponse::new(self.deltas.concat(), "chunked-vlm"))
        }

        fn supports_streaming(&self) -> bool {
            true
        }

        async fn chat_with_tools_stream(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _tool_choice: Option<ToolChoice>,
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<BoxStream<'static, edgequake_llm::Result<StreamChunk>>> {
            let mut chunks: Vec<edgequake_llm::Result<StreamChunk>> = self
                .deltas
                .iter()
                .map(|d| Ok(StreamChunk::Content(d.to_string())))
                .collect();
            chunks.push(Ok(StreamChunk::Finished {
                reason: "stop".into(),
                ttft_ms: None,
            }));
            Ok(stream::iter(chunks).boxed())
        }
    }

    fn image() -> ImageData {
        ImageData::new("aGVsbG8=", "image/png")
    }

    async fn collect(provider: Arc<dyn LLMProvider>) -> Vec<RecognitionEvent> {
        recognition_stream(provider, image(), "prompt".into(), ExtractionConfig::default())
            .map(|event| event.expect("recognition should succeed"))
            .collect()
            .await
    }

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay_ms(500, 1), 500);
        assert_eq!(backoff_delay_ms(500, 2), 1000);
        assert_eq!(backoff_delay_ms(500, 3), 2000);
        assert_eq!(backoff_delay_ms(500, 10), MAX_BACKOFF_MS);
    }

    #[test]
    fn backoff_survives_large_retry_counts() {
        assert_eq!(backoff_delay_ms(500, 64), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(500, 100), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(u64::MAX, u32::MAX), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(0, 100), 0);
    }

    #[tokio::test]
    async fn streaming_provider_yields_cumulative_snapshots() {
        let provider: Arc<dyn LLMProvider> = Arc::new(ChunkedProvider {
            deltas: vec!["Title: Ra", "in\nBio: ", "", "Poet\n"],
        });

        let events = collect(provider).await;

        assert_eq!(
            events,
            vec![
                Snapshot("Title: Ra".into()),
                Snapshot("Title: Rain\nBio: ".into()),
                Snapshot("Title: Rain\nBio: Poet\n".into()),
                Done("Title: Rain\nBio: Poet\n".into()),
            ]
        );
    }

    #[tokio::test]
    async fn non_streaming_provider_falls_back_to_one_snapshot() {
        let mock = MockProvider::new();
        mock.add_response("Title: Rain\n").await;
        let provider: Arc<dyn LLMProvider> = Arc::new(mock);
        assert!(!provider.supports_streaming());

        let events = collect(provider).await;

        assert_eq!(
            events,
            vec![
                Snapshot("Title: Rain\n".into()),
                Done("Title: Rain\n".into()),
            ]
        );
    }
}
