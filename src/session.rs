//! Extraction sessions: one uploaded flyer, one record, one output file.
//!
//! A session owns its [`Record`] exclusively. The only state it shares with
//! other sessions is the read-only [`SessionContext`] (config, schema,
//! template), handed in as an `Arc` at construction, so any number of
//! sessions can run concurrently without locks.
//!
//! Lifecycle:
//!
//! ```text
//! new ──▶ observe(snapshot)* ──▶ finish(final snapshot) ──▶ document on disk
//!              │
//!              └─▶ preview() after each step
//! ```
//!
//! Dropping a session before [`ExtractionSession::finish`] discards it with no
//! side effect. [`run_session`] drives a whole [`RecognitionStream`] through a
//! session on a background task and hands back one update per snapshot.

use crate::config::ExtractionConfig;
use crate::error::Flyer2MdError;
use crate::output::{Completion, RenderedDocument};
use crate::pipeline::template::{self, Template};
use crate::pipeline::{accumulate::RecordAccumulator, persist, preview};
use crate::progress::ProgressCallback;
use crate::prompts;
use crate::recognition::{RecognitionEvent, RecognitionStream};
use crate::record::Record;
use crate::schema::FieldSchema;
use futures::{Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Immutable, process-wide inputs shared by every session.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub config: ExtractionConfig,
    pub schema: FieldSchema,
    pub template: Template,
}

impl SessionContext {
    pub fn new(config: ExtractionConfig, schema: FieldSchema, template: Template) -> Self {
        Self {
            config,
            schema,
            template,
        }
    }

    /// The extraction prompt: the configured override, or one built from the schema.
    pub fn prompt(&self) -> String {
        self.config
            .prompt
            .clone()
            .unwrap_or_else(|| prompts::extraction_prompt(&self.schema))
    }
}

/// One extraction lifecycle for a single document.
pub struct ExtractionSession {
    ctx: Arc<SessionContext>,
    accumulator: RecordAccumulator,
}

impl ExtractionSession {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        let accumulator = RecordAccumulator::new(ctx.config.normalize_keys);
        Self { ctx, accumulator }
    }

    /// Reparse the full cumulative text seen so far.
    pub fn observe(&mut self, snapshot: &str) -> &Record {
        self.accumulator.observe(snapshot);
        let step = self.accumulator.observed();
        let fields = self.accumulator.record().len();
        if let Some(cb) = &self.ctx.config.progress_callback {
            cb.on_snapshot(step, fields);
        }
        self.accumulator.record()
    }

    /// Current best view of the record.
    pub fn record(&self) -> &Record {
        self.accumulator.record()
    }

    /// Snapshots observed so far.
    pub fn steps(&self) -> usize {
        self.accumulator.observed()
    }

    /// Markdown preview of the current record.
    pub fn preview(&self) -> String {
        preview::render_preview(self.record(), &self.ctx.schema, &self.ctx.config)
    }

    /// Render the current record through the template without writing anything.
    pub fn render(&self) -> String {
        self.ctx
            .template
            .render_filtered(self.record(), &self.ctx.schema, self.ctx.config.field_filter)
    }

    /// Observe the final snapshot, render it, and write the document.
    ///
    /// Consumes the session: the record is final from here on.
    pub async fn finish(mut self, final_snapshot: &str) -> Result<Completion, Flyer2MdError> {
        self.observe(final_snapshot);
        let markdown = self.render();
        let preview = self.preview();

        let config = &self.ctx.config;
        let stem = persist::timestamp_stem(chrono::Local::now());
        let path = persist::write_timestamped(
            &config.output_dir,
            &stem,
            "md",
            &markdown,
            config.collision_policy,
        )
        .await?;
        info!(
            "Rendered {} fields → {}",
            self.record().len(),
            path.display()
        );
        if let Some(cb) = &config.progress_callback {
            cb.on_document_written(&path);
        }

        let unresolved = template::unresolved_placeholders(&markdown);
        let snapshots = self.steps();
        Ok(Completion {
            record: self.accumulator.into_record(),
            preview,
            document: RenderedDocument {
                path,
                markdown,
                unresolved,
            },
            snapshots,
        })
    }
}

/// One item of a [`SessionStream`].
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// Emitted after every snapshot.
    Preview {
        /// 1-indexed snapshot number.
        step: usize,
        markdown: String,
        record: Record,
    },
    /// Emitted once, after the end-of-stream signal, when the document is on disk.
    Completed(Completion),
}

/// A boxed stream of session updates.
pub type SessionStream = Pin<Box<dyn Stream<Item = Result<SessionUpdate, Flyer2MdError>> + Send>>;

/// Drive `events` through a fresh session on a background task.
///
/// The returned stream yields one [`SessionUpdate::Preview`] per snapshot and
/// a final [`SessionUpdate::Completed`], then closes. An upstream error, or
/// the upstream closing without `Done`, is yielded as the last item and
/// nothing is written. Dropping the returned stream cancels the session: the
/// upstream is dropped and no document is rendered.
///
/// Must be called from within a Tokio runtime.
pub fn run_session(ctx: Arc<SessionContext>, events: RecognitionStream) -> SessionStream {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(drive(ctx, events, tx));
    Box::pin(ReceiverStream::new(rx))
}

type UpdateSender = mpsc::Sender<Result<SessionUpdate, Flyer2MdError>>;

async fn drive(ctx: Arc<SessionContext>, mut events: RecognitionStream, tx: UpdateSender) {
    let callback = ctx.config.progress_callback.clone();
    if let Some(cb) = &callback {
        cb.on_session_start();
    }
    let mut session = ExtractionSession::new(ctx);

    loop {
        let event = tokio::select! {
            _ = tx.closed() => {
                debug!("Session cancelled after {} snapshot(s)", session.steps());
                return;
            }
            event = events.next() => event,
        };

        match event {
            Some(Ok(RecognitionEvent::Snapshot(text))) => {
                session.observe(&text);
                let update = SessionUpdate::Preview {
                    step: session.steps(),
                    markdown: session.preview(),
                    record: session.record().clone(),
                };
                if tx.send(Ok(update)).await.is_err() {
                    debug!("Session cancelled after {} snapshot(s)", session.steps());
                    return;
                }
            }
            Some(Ok(RecognitionEvent::Done(text))) => {
                if tx.is_closed() {
                    return;
                }
                let result = session.finish(&text).await.map(SessionUpdate::Completed);
                if let Err(e) = &result {
                    report_error(&callback, e);
                }
                let _ = tx.send(result).await;
                return;
            }
            Some(Err(e)) => {
                report_error(&callback, &e);
                let _ = tx.send(Err(e)).await;
                return;
            }
            None => {
                let e = Flyer2MdError::StreamIncomplete {
                    snapshots: session.steps(),
                };
                report_error(&callback, &e);
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }
}

fn report_error(callback: &Option<ProgressCallback>, error: &Flyer2MdError) {
    warn!("Session failed: {}", error);
    if let Some(cb) = callback {
        cb.on_session_error(&error.to_string());
    }
}

/// Build a context from optional schema and template files.
///
/// Missing paths fall back to [`FieldSchema::flyer`] and the built-in template.
pub async fn load_context(
    config: ExtractionConfig,
    schema_path: Option<&Path>,
    template_path: Option<&Path>,
) -> Result<SessionContext, Flyer2MdError> {
    let schema = match schema_path {
        Some(p) => FieldSchema::load(p)?,
        None => FieldSchema::flyer(),
    };
    let template = match template_path {
        Some(p) => Template::load(p).await?,
        None => Template::default(),
    };
    Ok(SessionContext::new(config, schema, template))
}
