//! CLI binary for edgequake-flyer2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, prints live previews and reports the written document.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_flyer2md::{
    extract_stream, extract_stream_from_text, load_context, CollisionPolicy, Completion,
    ExtractionConfig, ExtractionProgressCallback, ExtractionStats, FieldFilter, ProgressCallback,
    SessionStream, SessionUpdate,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that tracks the session and prints each preview above
/// itself.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading image…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Print a preview block without tearing the spinner line.
    fn show_preview(&self, step: usize, markdown: &str) {
        self.bar.println(format!("{} {}", cyan("◆"), bold(&format!("Preview {step}"))));
        self.bar.println(markdown.trim_end());
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_session_start(&self) {
        self.bar.set_prefix("Recognising");
        self.bar.set_message("waiting for the model…");
    }

    fn on_snapshot(&self, step: usize, fields: usize) {
        self.bar
            .set_message(format!("snapshot {step}  {}", dim(&format!("{fields} fields"))));
    }

    fn on_document_written(&self, path: &Path) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
    }

    fn on_session_error(&self, error: &str) {
        self.bar.finish_and_clear();
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        eprintln!("{} {}", red("✘"), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a flyer photo with the built-in template
  flyer2md flyer.jpg

  # Custom template and output directory
  flyer2md --template talk.md --output-dir notes/ flyer.png

  # Show pending schema fields while streaming
  flyer2md --show-missing flyer.jpg

  # Only substitute fields listed in a custom schema
  flyer2md --schema fields.json --schema-only flyer.jpg

  # Re-render a saved model answer (no API key needed)
  flyer2md --from-text answer.txt

  # JSON output with record and stats
  flyer2md --json flyer.jpg > flyer.json

TEMPLATES:
  Placeholders are {{key}} with the lower-cased field name, e.g. {{bio}},
  {{主讲人}}. Placeholders with no matching field are left untouched.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override the log filter
"#;

/// Extract talk flyers into Markdown using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "flyer2md",
    version,
    about = "Extract talk flyers into Markdown using Vision LLMs",
    long_about = "Read a photographed talk flyer (local file or URL) with a Vision Language Model, \
parse the answer into fields, preview them as they arrive, and write the fields into a Markdown \
template under a timestamp-named file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image path (PNG/JPEG) or HTTP/HTTPS URL.
    #[arg(required_unless_present = "from_text")]
    input: Option<String>,

    /// Replay a saved model answer instead of calling a VLM.
    #[arg(long, conflicts_with = "input")]
    from_text: Option<PathBuf>,

    /// Markdown template with {{key}} placeholders.
    #[arg(short, long, env = "FLYER2MD_TEMPLATE")]
    template: Option<PathBuf>,

    /// JSON field schema (defaults to the built-in flyer schema).
    #[arg(short, long, env = "FLYER2MD_SCHEMA")]
    schema: Option<PathBuf>,

    /// Directory for rendered documents and normalised images.
    #[arg(short, long, env = "FLYER2MD_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// List schema fields not yet observed in the preview.
    #[arg(long, env = "FLYER2MD_SHOW_MISSING")]
    show_missing: bool,

    /// Ignore keys the schema does not list.
    #[arg(long, env = "FLYER2MD_SCHEMA_ONLY")]
    schema_only: bool,

    /// Replace an existing file with the same timestamp instead of suffixing.
    #[arg(long)]
    overwrite: bool,

    /// Fold full-width colons, list markers and emphasis out of keys.
    #[arg(long, env = "FLYER2MD_NORMALIZE_KEYS")]
    normalize_keys: bool,

    /// Send the image as-is instead of downscaling it first.
    #[arg(long)]
    no_normalize: bool,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "FLYER2MD_PROMPT")]
    prompt: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Max LLM output tokens.
    #[arg(long, env = "FLYER2MD_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "FLYER2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries on LLM failure.
    #[arg(long, env = "FLYER2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "FLYER2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "FLYER2MD_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output structured JSON instead of Markdown.
    #[arg(long, env = "FLYER2MD_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FLYER2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FLYER2MD_QUIET")]
    quiet: bool,
}

/// JSON shape printed with `--json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    completion: &'a Completion,
    stats: ExtractionStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the feedback that matters; keep INFO logs out of its way.
    let show_progress = !cli.quiet && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else if show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )
    .await?;

    let ctx = Arc::new(
        load_context(config, cli.schema.as_deref(), cli.template.as_deref())
            .await
            .context("Failed to load schema or template")?,
    );

    // ── Run extraction ───────────────────────────────────────────────────
    let start = Instant::now();
    let updates = if let Some(ref path) = cli.from_text {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read transcript from {:?}", path))?;
        extract_stream_from_text(&text, &ctx)
    } else {
        let input = cli.input.as_deref().context("No input given")?;
        extract_stream(input, &ctx)
            .await
            .context("Extraction failed")?
    };

    let completion = drain(updates, progress.as_deref()).await?;
    let stats = ExtractionStats {
        snapshots: completion.snapshots,
        fields: completion.record.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        normalized_image: None,
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let report = JsonReport {
            completion: &completion,
            stats,
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", completion.document.path.display())
        .context("Failed to write to stdout")?;
    handle
        .write_all(completion.document.markdown.as_bytes())
        .context("Failed to write to stdout")?;
    if !completion.document.markdown.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet {
        eprintln!(
            "   {} fields  /  {} snapshots  —  {}ms total",
            dim(&stats.fields.to_string()),
            dim(&stats.snapshots.to_string()),
            stats.duration_ms,
        );
        if !completion.document.unresolved.is_empty() {
            eprintln!(
                "   {} unfilled: {}",
                cyan("⚠"),
                completion.document.unresolved.join(", ")
            );
        }
    }

    Ok(())
}

/// Consume the session, printing previews, until the document is written.
async fn drain(
    mut updates: SessionStream,
    progress: Option<&CliProgressCallback>,
) -> Result<Completion> {
    while let Some(update) = updates.next().await {
        match update.context("Extraction failed")? {
            SessionUpdate::Preview { step, markdown, .. } => match progress {
                Some(cb) => cb.show_preview(step, &markdown),
                None => tracing::debug!("Preview {}:\n{}", step, markdown),
            },
            SessionUpdate::Completed(done) => return Ok(done),
        }
    }
    anyhow::bail!("Session ended without writing a document")
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .output_dir(&cli.output_dir)
        .show_missing_fields(cli.show_missing)
        .normalize_keys(cli.normalize_keys)
        .normalize_image(!cli.no_normalize)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if cli.schema_only {
        builder = builder.field_filter(FieldFilter::SchemaOnly);
    }
    if cli.overwrite {
        builder = builder.collision_policy(CollisionPolicy::Overwrite);
    }
    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
