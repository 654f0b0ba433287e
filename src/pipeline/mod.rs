//! Pipeline stages for flyer-to-Markdown extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the recognition backend can change without touching
//! the text stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ encode ──▶ llm ─┐
//! (URL/path)  (resize)    (base64)  (VLM) │ snapshots
//!                                         ▼
//!        persist ◀── template ◀── preview ◀── accumulate ◀── parse ◀── sanitize
//!        (file)      ({{key}})    (elide)     (reduce)      (k: v)    (fences)
//! ```
//!
//! 1. [`input`]     — canonicalise the user-supplied path or URL to a local image
//! 2. [`normalize`] — downscale to the pixel budget; runs in `spawn_blocking`
//! 3. [`encode`]    — PNG-encode and base64-wrap for the multimodal request body
//! 4. [`llm`]       — drive the VLM call with timeout and retry; the only
//!    stage with network I/O
//! 5. [`sanitize`]  — strip code fences and invisible characters from a snapshot
//! 6. [`parse`]     — split lines on the first `:` into an ordered [`crate::Record`]
//! 7. [`accumulate`] — re-derive the record from each cumulative snapshot
//! 8. [`preview`]   — render the short-value preview shown while streaming
//! 9. [`template`]  — substitute `{{key}}` placeholders in one pass
//! 10. [`persist`]  — reserve a timestamp-named file and write atomically

pub mod accumulate;
pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod parse;
pub mod persist;
pub mod preview;
pub mod sanitize;
pub mod template;
