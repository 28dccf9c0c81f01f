//! CLI binary for edgequake-pdf2json.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints a run summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2json::{
    extract, ExtractionConfig, ExtractionProgressCallback, ImageFormat, ProgressCallback,
    RunSummary,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per candidate.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the in-flight request; candidates run one at a time.
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports the candidate count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.set_message("");
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_candidates: usize) {
        self.activate_bar(total_candidates);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_candidates} images…"))
        ));
    }

    fn on_candidate_skipped(&self, index: usize, total: usize, name: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            dim("·"),
            index,
            total,
            name,
            dim("already recorded"),
        ));
        self.bar.inc(1);
    }

    fn on_candidate_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_candidate_recorded(&self, index: usize, total: usize, name: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_candidate_quarantined(&self, index: usize, total: usize, name: &str, error: &str) {
        // Keep one line per image even for long service errors.
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(Some('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _succeeded: usize, _failed: usize, _skipped: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every page with the default prompt
  pdf2json statement.pdf

  # Custom prompt, slower pacing for a low-tier API key
  pdf2json --prompt-file invoice_prompt.txt --interval-secs 20 invoice.pdf

  # Retry everything not yet in <id>_final_folders
  pdf2json --fresh statement.pdf

  # Any OpenAI-compatible server
  pdf2json --endpoint http://localhost:8000/v1/chat/completions --model llava doc.pdf

  # Machine-readable run summary
  pdf2json --json --no-progress statement.pdf > summary.json

OUTPUT (next to the PDF, <id> = file name without punctuation):
  <id>_final_folders/   one <image>.json per extracted page or slice
  <id>_errors/          raw service responses that could not be used
  <id>_tmp_images/      rendered images (removed with --cleanup)

Re-running resumes: images that already have a record are not sent again.
Delete a file from <id>_errors/ to retry that image. --fresh clears
<id>_errors/ but never <id>_final_folders/; delete a record there to redo it.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key for the completion endpoint
  PDF2JSON_MODEL          Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise ./ then system)
"#;

/// Extract structured JSON from PDF pages using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2json",
    version,
    about = "Extract structured JSON from PDF pages using Vision LLMs",
    long_about = "Rasterise each page of a PDF, send it to a vision-capable chat-completion \
endpoint (OpenAI or any compatible server) and store the JSON it returns, one record per \
page or page slice.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Text file with the extraction prompt (replaces the built-in prompt).
    #[arg(long, env = "PDF2JSON_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// API key for the completion endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "PDF2JSON_MODEL", default_value = "gpt-4o")]
    model: String,

    /// Chat-completion endpoint URL.
    #[arg(
        long,
        env = "PDF2JSON_ENDPOINT",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    endpoint: String,

    /// Minimum seconds between the end of one request and the next.
    #[arg(long, env = "PDF2JSON_INTERVAL_SECS", default_value_t = 8.0)]
    interval_secs: f64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "PDF2JSON_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Max output tokens per request.
    #[arg(long, env = "PDF2JSON_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Image format of rendered pages.
    #[arg(long, env = "PDF2JSON_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// Render scale factor (1.0 = 72 DPI).
    #[arg(long, env = "PDF2JSON_SCALE", default_value_t = 1.0)]
    scale: f32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2JSON_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Delete the rendered images after the run.
    #[arg(long, env = "PDF2JSON_CLEANUP")]
    cleanup: bool,

    /// Discard output and error records from earlier runs. Records already
    /// committed to <id>_final_folders are kept, so those images are still skipped.
    #[arg(long)]
    fresh: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2JSON_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for ImageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpeg => ImageFormat::Jpeg,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let summary = extract(&cli.input, &config)
        .await
        .with_context(|| format!("Extraction failed for {}", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    }
    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    if !cli.interval_secs.is_finite() || cli.interval_secs < 0.0 {
        anyhow::bail!("--interval-secs must be a non-negative number");
    }

    let mut builder = ExtractionConfig::builder()
        .model(cli.model.clone())
        .endpoint(cli.endpoint.clone())
        .max_tokens(cli.max_tokens)
        .request_timeout_secs(cli.timeout)
        .min_request_interval(Duration::from_secs_f64(cli.interval_secs))
        .image_format(cli.format.into())
        .render_scale(cli.scale)
        .cleanup(cli.cleanup)
        .fresh_start(cli.fresh);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &RunSummary) {
    let (succeeded, failed, skipped) = (summary.succeeded(), summary.failed(), summary.skipped());
    let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
    eprintln!(
        "{}  {} recorded  {} quarantined  {} skipped  {}",
        mark,
        bold(&succeeded.to_string()),
        if failed == 0 {
            failed.to_string()
        } else {
            red(&failed.to_string())
        },
        skipped,
        dim(&format!("{}ms", summary.total_duration_ms)),
    );
    if let Some(ref dir) = summary.commit.final_dir {
        eprintln!("   results  →  {}", bold(&dir.display().to_string()));
    }
    if let Some(ref dir) = summary.commit.errors_dir {
        eprintln!("   errors   →  {}", red(&dir.display().to_string()));
    }
}
