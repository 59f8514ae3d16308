//! CLI binary for bookchain.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `ChainConfig` plus a stage list and prints the run report.

use anyhow::{Context, Result};
use bookchain::{
    builtin_registry, Book, BookChain, ChainConfig, ChainProgressCallback, ConnectionKind,
    ProgressCallback, StageDescriptor, StageReader, StageWriter, StagedNaming,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while wiring, then a bar over the
/// stages. Stages may finish out of order in concurrent mode.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Wiring");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} stages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Running");
    }
}

impl ChainProgressCallback for CliProgressCallback {
    fn on_connection_created(&self, position: usize, kind: &ConnectionKind) {
        let what = match kind {
            ConnectionKind::Pipe { capacity } => format!("pipe ({capacity} bytes)"),
            ConnectionKind::File { path } => path.display().to_string(),
        };
        self.bar
            .println(format!("  {} #{} → #{}  {}", dim("⇢"), position, position + 1, dim(&what)));
    }

    fn on_stage_wired(&self, _position: usize, stage: &str) {
        self.bar.set_message(stage.to_string());
    }

    fn on_wiring_complete(&self, total_stages: usize) {
        self.activate_bar(total_stages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Running {total_stages} stages…"))
        ));
    }

    fn on_stage_complete(&self, position: usize, stage: &str, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} #{:<2} {:<14}  {}",
            green("✓"),
            position,
            stage,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_stage_error(&self, position: usize, stage: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} #{:<2} {:<14}  {}",
            red("✗"),
            position,
            stage,
            red(error),
        ));
        self.bar.inc(1);
    }

    fn on_chain_complete(&self, total_stages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 && success_count == total_stages {
            eprintln!(
                "{} {} stages completed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} stages completed",
                red("✘"),
                bold(&success_count.to_string()),
                total_stages
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Clean up a chapter, write to stdout
  bookchain --stages clean chapter.html

  # Several stages, intermediate files kept next to the input
  bookchain --stages clean,front-matter --title "Openbook" index.htm -o index.md

  # Run all stages at once, connected by in-memory pipes
  bookchain --concurrent --stages clean,upper index.htm -o INDEX.txt

  # Read stdin; name intermediate files after a different original
  cat index.htm | bookchain --original /tmp/index.htm --stages clean - -o out.htm

  # Show the registered stages
  bookchain --list-stages

ENVIRONMENT VARIABLES:
  BOOKCHAIN_STAGES        Default stage list
  BOOKCHAIN_CONCURRENT    Run stages concurrently
  RUST_LOG                Override the log filter (tracing EnvFilter syntax)
"#;

/// Run a chain of transformation stages over a book file.
#[derive(Parser, Debug)]
#[command(
    name = "bookchain",
    version,
    about = "Run a configurable chain of transformation stages over a book file",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file, or `-` for stdin.
    #[arg(required_unless_present = "list_stages")]
    input: Option<String>,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "BOOKCHAIN_OUTPUT")]
    output: Option<PathBuf>,

    /// Comma-separated stage list, e.g. `clean,front-matter`.
    #[arg(short, long, env = "BOOKCHAIN_STAGES", default_value = "copy")]
    stages: String,

    /// Original file used to name intermediate files. Default: the input path.
    #[arg(long, env = "BOOKCHAIN_ORIGINAL")]
    original: Option<PathBuf>,

    /// Run all stages concurrently over in-memory pipes.
    #[arg(short, long, env = "BOOKCHAIN_CONCURRENT")]
    concurrent: bool,

    /// In-memory pipe capacity in bytes (concurrent mode).
    #[arg(long, env = "BOOKCHAIN_PIPE_CAPACITY", default_value_t = bookchain::DEFAULT_PIPE_CAPACITY)]
    pipe_capacity: usize,

    /// Insert the stage position into intermediate file names.
    #[arg(long, env = "BOOKCHAIN_POSITIONAL_NAMES")]
    positional_names: bool,

    /// Concurrent mode: keep awaiting other stages after one fails.
    #[arg(long, env = "BOOKCHAIN_KEEP_GOING")]
    keep_going: bool,

    /// JSON file with book metadata (title, author, language, metadata).
    #[arg(long, env = "BOOKCHAIN_BOOK")]
    book: Option<PathBuf>,

    /// Book title (overrides --book).
    #[arg(long)]
    title: Option<String>,

    /// Book author (overrides --book).
    #[arg(long)]
    author: Option<String>,

    /// Book language tag (overrides --book).
    #[arg(long)]
    language: Option<String>,

    /// Print the run report as JSON on stderr.
    #[arg(long, env = "BOOKCHAIN_JSON")]
    json: bool,

    /// List registered stages and exit.
    #[arg(long)]
    list_stages: bool,

    /// Disable progress bar.
    #[arg(long, env = "BOOKCHAIN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BOOKCHAIN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BOOKCHAIN_QUIET")]
    quiet: bool,
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

    // ── List-only mode ───────────────────────────────────────────────────
    let registry = Arc::new(builtin_registry());
    if cli.list_stages {
        for name in registry.names() {
            let ext = registry
                .get(name)
                .and_then(|e| e.extension())
                .unwrap_or("-");
            println!("{name:<14} {ext}");
        }
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("An input file (or `-`) is required")?;
    let stages = StageDescriptor::parse_list(&cli.stages);
    if stages.is_empty() {
        anyhow::bail!("--stages must name at least one stage");
    }

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ChainProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;
    let book = Arc::new(build_book(&cli)?);

    // ── Open streams ─────────────────────────────────────────────────────
    let source: StageReader = if input == "-" {
        Box::new(tokio::io::stdin())
    } else {
        Box::new(
            tokio::fs::File::open(&input)
                .await
                .with_context(|| format!("Failed to open input '{input}'"))?,
        )
    };
    let target: StageWriter = match cli.output {
        Some(ref path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create output {:?}", path))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };
    let original = match (&cli.original, input.as_str()) {
        (Some(path), _) => path.clone(),
        (None, "-") => anyhow::bail!("--original is required when reading stdin"),
        (None, path) => PathBuf::from(path),
    };

    // ── Run chain ────────────────────────────────────────────────────────
    let report = BookChain::new(book, &original, source, target, config, stages)
        .with_registry(registry)
        .run()
        .await
        .context("Chain failed")?;

    if cli.json {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet && !show_progress {
        eprintln!(
            "Ran {} stages in {}ms",
            report.stages.len(),
            report.total_duration_ms
        );
    }
    if !cli.quiet && !cli.json && !report.staged_files.is_empty() {
        for path in &report.staged_files {
            eprintln!("   {}", dim(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `ChainConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ChainConfig> {
    let naming = if cli.positional_names {
        StagedNaming::Positional
    } else {
        StagedNaming::Extension
    };

    let mut builder = ChainConfig::builder()
        .concurrent(cli.concurrent)
        .pipe_capacity(cli.pipe_capacity)
        .staged_naming(naming)
        .fail_fast(!cli.keep_going);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Book metadata from `--book`, then individual flags on top.
fn build_book(cli: &Cli) -> Result<Book> {
    let mut book = match cli.book {
        Some(ref path) => Book::from_json_file(path).context("Failed to load book metadata")?,
        None => Book::default(),
    };
    if let Some(ref t) = cli.title {
        book.title = Some(t.clone());
    }
    if let Some(ref a) = cli.author {
        book.author = Some(a.clone());
    }
    if let Some(ref l) = cli.language {
        book.language = Some(l.clone());
    }
    Ok(book)
}
