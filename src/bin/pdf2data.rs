//! CLI binary for edgequake-pdf2data.
//!
//! A thin shim over the library crate: maps flags to `PipelineConfig`,
//! picks the extraction client, runs the folder once and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2data::{
    resolve_api_key, ExtractionClient, GeminiClient, Pipeline, PipelineConfig, ProgressCallback,
    RunProgressCallback, RunSummary, VisionClient,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

/// Live progress bar with one log line per finished document.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning folder…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, pending: usize, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} PDFs  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(pending as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{pending} of {total} PDFs to process…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _pending: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, index: usize, pending: usize, name: &str, records: usize) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            pending,
            name,
            dim(&format!("{records} records")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, pending: usize, name: &str, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            pending,
            name,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _succeeded: usize, _failed: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process every new PDF in the current folder
  pdf2data

  # A specific folder, at most 10 documents this run
  pdf2data ~/papers --max 10

  # Keep raw model replies next to the JSON output
  pdf2data ~/papers --debug

  # Use a vision model instead of the Gemini Files API
  pdf2data ~/papers --provider openai --model gpt-4.1-mini

FOLDER LAYOUT:
  <target>/extraction_prompt.txt   what to extract (required)
  <target>/*.pdf                   inputs, renamed to "{doi} - {title}.pdf"
  <target>/output/                 <name>.json, combined_data.json, dataset.csv
  <target>/processed_pdfs/         inputs that were extracted successfully
  <target>/pipeline_checkpoint.json
  <target>/renamed_files.json

  Re-running is safe: processed PDFs are skipped, failed ones are retried.

ENVIRONMENT VARIABLES:
  LLM_API_KEY / GEMINI_API_KEY   Gemini API key (or api_key.txt in the target)
  OPENAI_API_KEY                 OpenAI key for --provider openai
  ANTHROPIC_API_KEY              Anthropic key for --provider anthropic
  PDFIUM_LIB_PATH                Path to libpdfium
"#;

/// Extract structured data from a folder of PDFs with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2data",
    version,
    about = "Resumable batch extraction of structured data from PDF folders using LLMs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder holding the PDFs and extraction_prompt.txt.
    #[arg(default_value = ".", env = "PDF2DATA_TARGET")]
    target: PathBuf,

    /// Gemini API key (overrides env vars and key files).
    #[arg(long, env = "PDF2DATA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Provider: gemini (Files API) or any vision provider (openai, anthropic, ollama, …).
    #[arg(long, env = "PDF2DATA_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Model ID. Default: gemini-2.5-pro for gemini, gpt-4.1-mini otherwise.
    #[arg(long, env = "PDF2DATA_MODEL")]
    model: Option<String>,

    /// Extraction directive file. Default: <target>/extraction_prompt.txt.
    #[arg(long, env = "PDF2DATA_PROMPT")]
    prompt: Option<PathBuf>,

    /// Process at most this many documents in this run.
    #[arg(long, env = "PDF2DATA_MAX",
          value_parser = clap::value_parser!(u64).range(1..))]
    max: Option<u64>,

    /// Save raw model replies as output/DEBUG_<name>.txt.
    #[arg(long, env = "PDF2DATA_DEBUG")]
    debug: bool,

    /// Skip the DOI/title renaming pass.
    #[arg(long, env = "PDF2DATA_NO_RENAME")]
    no_rename: bool,

    /// Status poll interval in milliseconds.
    #[arg(long, env = "PDF2DATA_POLL_INTERVAL", default_value_t = 1000)]
    poll_interval: u64,

    /// Per-document extraction timeout in seconds.
    #[arg(long, env = "PDF2DATA_TIMEOUT", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Pause between documents in milliseconds.
    #[arg(long, env = "PDF2DATA_DELAY", default_value_t = 1000)]
    delay: u64,

    /// Retries per document for vision providers.
    #[arg(long, env = "PDF2DATA_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Pages sent to vision providers per document.
    #[arg(long, env = "PDF2DATA_MAX_PAGES", default_value_t = 20)]
    max_pages: usize,

    /// Disable progress bar.
    #[arg(long, env = "PDF2DATA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2DATA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2DATA_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO is muted while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.verbose;
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

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RunProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;
    let client = build_client(&cli, &config)?;

    let mut pipeline = Pipeline::open(config, client).context("Setup failed")?;
    let summary = pipeline.run().await.context("Run aborted")?;

    if !cli.quiet {
        print_summary(&summary);
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder(&cli.target)
        .provider(&cli.provider)
        .rename_inputs(!cli.no_rename)
        .debug(cli.debug)
        .poll_interval_ms(cli.poll_interval)
        .extraction_timeout_secs(cli.timeout)
        .document_delay_ms(cli.delay)
        .max_retries(cli.max_retries)
        .max_pages(cli.max_pages);

    if let Some(ref prompt) = cli.prompt {
        builder = builder.prompt_path(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(max) = cli.max {
        builder = builder.max_documents(max as usize);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `gemini` gets the Files API client; every other name goes through edgequake-llm.
fn build_client(cli: &Cli, config: &PipelineConfig) -> Result<Arc<dyn ExtractionClient>> {
    if config.provider == "gemini" {
        let key = resolve_api_key(cli.api_key.as_deref(), &config.target_dir, &config.provider)?;
        let client = GeminiClient::new(key, config.model.clone(), config.poll_policy())
            .context("Failed to create Gemini client")?;
        Ok(Arc::new(client))
    } else {
        Ok(Arc::new(VisionClient::from_config(config)?))
    }
}

fn print_summary(s: &RunSummary) {
    let mark = if s.failed == 0 {
        green("✔")
    } else if s.succeeded == 0 && s.attempted > 0 {
        red("✘")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{}  {} succeeded  /  {} failed  /  {} remaining  {}",
        mark,
        bold(&s.succeeded.to_string()),
        s.failed,
        s.remaining,
        dim(&format!("({} records)", s.records)),
    );
    if s.renamed > 0 {
        eprintln!("   {} files renamed", s.renamed);
    }
    if let Some(ref combined) = s.combined_file {
        eprintln!("   → {}", bold(&combined.display().to_string()));
    }
    if let Some(ref export) = s.export_file {
        eprintln!("   → {}", bold(&export.display().to_string()));
    }
}
