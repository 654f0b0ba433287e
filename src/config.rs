//! Configuration types for flyer extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The config is immutable once built and
//! is shared read-only by every session through a
//! [`crate::session::SessionContext`], so concurrent sessions never see each
//! other's changes.

use crate::error::Flyer2MdError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for an extraction session.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_flyer2md::{CollisionPolicy, ExtractionConfig, FieldFilter};
///
/// let config = ExtractionConfig::builder()
///     .output_dir("out")
///     .show_missing_fields(true)
///     .field_filter(FieldFilter::SchemaOnly)
///     .collision_policy(CollisionPolicy::Overwrite)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    // ── Preview ──────────────────────────────────────────────────────────
    /// Values longer than this many characters are elided in the preview. Default: 30.
    pub preview_max_chars: usize,

    /// Characters kept from the start of an elided value. Default: 15.
    pub preview_head: usize,

    /// Characters kept from the end of an elided value. Default: 15.
    pub preview_tail: usize,

    /// Show every schema field in the preview, marking absent ones as pending. Default: false.
    pub show_missing_fields: bool,

    /// Text shown under a pending field's heading. Default: `等待中……`.
    pub pending_text: String,

    // ── Fields ───────────────────────────────────────────────────────────
    /// Which observed keys reach the preview and the template. Default: [`FieldFilter::All`].
    pub field_filter: FieldFilter,

    /// Tolerate common producer drift in keys (full-width colon, `**bold**`
    /// keys, list markers) before parsing. Default: false.
    pub normalize_keys: bool,

    // ── Output ───────────────────────────────────────────────────────────
    /// Directory receiving rendered documents and normalised images. Default: `output`.
    pub output_dir: PathBuf,

    /// What to do when a timestamp-named output already exists. Default: [`CollisionPolicy::Suffix`].
    pub collision_policy: CollisionPolicy,

    // ── Image normalisation ──────────────────────────────────────────────
    /// Resize the input before recognition. Default: true.
    pub normalize_image: bool,

    /// Pixel budget of the normalised image. Default: 700 000.
    pub target_pixels: u64,

    /// Each normalised dimension is floored to a multiple of this. Default: 28.
    pub dimension_multiple: u32,

    // ── Recognition ──────────────────────────────────────────────────────
    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed recognition call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom extraction prompt. If None, one is built from the schema.
    pub prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Session progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            preview_max_chars: 30,
            preview_head: 15,
            preview_tail: 15,
            show_missing_fields: false,
            pending_text: "等待中……".to_string(),
            field_filter: FieldFilter::default(),
            normalize_keys: false,
            output_dir: PathBuf::from("output"),
            collision_policy: CollisionPolicy::default(),
            normalize_image: true,
            target_pixels: 700_000,
            dimension_multiple: 28,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            prompt: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("preview_max_chars", &self.preview_max_chars)
            .field("preview_head", &self.preview_head)
            .field("preview_tail", &self.preview_tail)
            .field("show_missing_fields", &self.show_missing_fields)
            .field("field_filter", &self.field_filter)
            .field("normalize_keys", &self.normalize_keys)
            .field("output_dir", &self.output_dir)
            .field("collision_policy", &self.collision_policy)
            .field("normalize_image", &self.normalize_image)
            .field("target_pixels", &self.target_pixels)
            .field("dimension_multiple", &self.dimension_multiple)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn preview_max_chars(mut self, n: usize) -> Self {
        self.config.preview_max_chars = n;
        self
    }

    pub fn preview_head(mut self, n: usize) -> Self {
        self.config.preview_head = n;
        self
    }

    pub fn preview_tail(mut self, n: usize) -> Self {
        self.config.preview_tail = n;
        self
    }

    pub fn show_missing_fields(mut self, v: bool) -> Self {
        self.config.show_missing_fields = v;
        self
    }

    pub fn pending_text(mut self, text: impl Into<String>) -> Self {
        self.config.pending_text = text.into();
        self
    }

    pub fn field_filter(mut self, filter: FieldFilter) -> Self {
        self.config.field_filter = filter;
        self
    }

    pub fn normalize_keys(mut self, v: bool) -> Self {
        self.config.normalize_keys = v;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.config.collision_policy = policy;
        self
    }

    pub fn normalize_image(mut self, v: bool) -> Self {
        self.config.normalize_image = v;
        self
    }

    pub fn target_pixels(mut self, px: u64) -> Self {
        self.config.target_pixels = px;
        self
    }

    pub fn dimension_multiple(mut self, n: u32) -> Self {
        self.config.dimension_multiple = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Flyer2MdError> {
        let c = &self.config;
        if c.preview_max_chars == 0 {
            return Err(Flyer2MdError::InvalidConfig(
                "preview_max_chars must be ≥ 1".into(),
            ));
        }
        if c.dimension_multiple == 0 {
            return Err(Flyer2MdError::InvalidConfig(
                "dimension_multiple must be ≥ 1".into(),
            ));
        }
        let min_pixels = u64::from(c.dimension_multiple).pow(2);
        if c.target_pixels < min_pixels {
            return Err(Flyer2MdError::InvalidConfig(format!(
                "target_pixels must be ≥ {} (one {}×{} tile), got {}",
                min_pixels, c.dimension_multiple, c.dimension_multiple, c.target_pixels
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which observed keys are shown and substituted.
///
/// Parsing always keeps every key; this only filters at preview and
/// render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldFilter {
    /// Every observed key, including ones the schema does not list. (default)
    #[default]
    All,
    /// Only keys the schema lists (matched case-insensitively).
    SchemaOnly,
}

/// Behaviour when the timestamp-derived output name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// Append `-1`, `-2`, … until an unused name is found. (default)
    #[default]
    Suffix,
    /// Replace the existing file.
    Overwrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.preview_max_chars, 30);
        assert_eq!(c.preview_head, 15);
        assert_eq!(c.preview_tail, 15);
        assert!(!c.show_missing_fields);
        assert_eq!(c.field_filter, FieldFilter::All);
        assert_eq!(c.collision_policy, CollisionPolicy::Suffix);
        assert_eq!(c.target_pixels, 700_000);
        assert_eq!(c.dimension_multiple, 28);
        assert_eq!(c.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn builder_rejects_zero_preview_limit() {
        let err = ExtractionConfig::builder()
            .preview_max_chars(0)
            .build()
            .expect_err("zero limit must fail");
        assert!(err.to_string().contains("preview_max_chars"));
    }

    #[test]
    fn builder_rejects_budget_below_one_tile() {
        assert!(ExtractionConfig::builder()
            .target_pixels(28 * 28 - 1)
            .build()
            .is_err());
        assert!(ExtractionConfig::builder()
            .target_pixels(28 * 28)
            .build()
            .is_ok());
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = ExtractionConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn debug_hides_provider() {
        let c = ExtractionConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("preview_max_chars"));
    }
}
