//! # edgequake-flyer2md
//!
//! Turn a photographed talk flyer into a filled-in Markdown document using
//! Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Event flyers carry the same handful of facts (speaker, host, time, venue,
//! abstract, bio) in wildly different layouts. Instead of OCR plus layout
//! heuristics, this crate shows the image to a VLM, asks for plain
//! `key: value` lines, and parses whatever text has arrived so far into an
//! ordered record. Every snapshot produces a compact preview; the final one
//! is substituted into a Markdown template and written to a timestamp-named
//! file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / URL
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Normalise  downscale to ~700k px, sides multiple of 28 (spawn_blocking)
//!  ├─ 3. Encode     PNG → base64 ImageData
//!  ├─ 4. VLM        gpt-4.1-nano / claude / gemini / … → cumulative snapshots
//!  ├─ 5. Session    sanitise → parse → preview, once per snapshot
//!  └─ 6. Output     template substitution → YYYY-MM-DD-HH-MM-SS.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_flyer2md::{extract, ExtractionConfig, SessionContext};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::builder().output_dir("output").build()?;
//!     let ctx = Arc::new(SessionContext::new(config, Default::default(), Default::default()));
//!     let output = extract("flyer.jpg", &ctx).await?;
//!     println!("{}", output.preview);
//!     eprintln!("written to {}", output.document.path.display());
//!     Ok(())
//! }
//! ```
//!
//! Re-render a saved model answer without any image or API key:
//!
//! ```rust
//! use edgequake_flyer2md::{Record, pipeline::parse::parse_record};
//!
//! let record: Record = parse_record("主讲人: 张三\nBio: Professor of CS");
//! assert_eq!(record.get("主讲人"), Some("张三"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `flyer2md` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-flyer2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod recognition;
pub mod record;
pub mod replay;
pub mod schema;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CollisionPolicy, ExtractionConfig, ExtractionConfigBuilder, FieldFilter};
pub use error::Flyer2MdError;
pub use extract::{extract, extract_from_text, extract_sync};
pub use output::{Completion, ExtractionOutput, ExtractionStats, RenderedDocument};
pub use pipeline::template::Template;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use recognition::{RecognitionEvent, RecognitionStream};
pub use record::Record;
pub use schema::{FieldSchema, FieldSpec, PreviewPolicy};
pub use session::{
    load_context, run_session, ExtractionSession, SessionContext, SessionStream, SessionUpdate,
};
pub use stream::{extract_stream, extract_stream_from_text};
