//! CLI layer: argument parsing, logging setup, command dispatch and result
//! printing.
//!
//! Each command drives a [`FilterModeController`] exactly as an interactive
//! tree view would, then prints the final tree.

pub mod args;

pub use args::*;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use treefilter::search::searcher_for;
use treefilter::session::ViewLocation;
use treefilter::tree::{DisplayEntry, EntryKind};
use treefilter::{EngineConfig, FilterError, FilterHost, FilterMode, FilterModeController, SearchBackend};

// ─── CLI ─────────────────────────────────────────────────────────────

/// Incremental content search and filename filtering over workspace trees
#[derive(Parser, Debug)]
#[command(name = "treefilter", version, about, after_help = "\
Run 'treefilter <COMMAND> --help' for detailed options.\n\
Common options: -r <ROOT> (repeatable), --hidden, --json")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Search file contents and print the hit tree
    Content(ContentArgs),

    /// Filter file names and print the matching tree
    Files(FilesArgs),

    /// Apply queries as successive prompt edits, then print the final tree
    Replay(ReplayArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Content(args) => {
            init_logging(&args.common);
            run_queries(&args.common, FilterMode::Content, args.backend, &[args.query])
        }
        Commands::Files(args) => {
            init_logging(&args.common);
            run_queries(&args.common, FilterMode::Files, None, &[args.query])
        }
        Commands::Replay(args) => {
            init_logging(&args.common);
            run_queries(&args.common, args.mode, args.backend, &args.queries)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(common: &CommonArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("treefilter={}", common.log_level)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if common.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load the config file; an unreadable or malformed one falls back to defaults.
fn load_config(common: &CommonArgs, backend: Option<SearchBackend>) -> EngineConfig {
    let path = common.config.clone().unwrap_or_else(EngineConfig::default_path);
    let mut config = match EngineConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "ignoring invalid config");
            EngineConfig::default()
        }
    };
    if let Some(backend) = backend {
        config.backend = backend;
    }
    debug!(path = %path.display(), backend = ?config.backend, "config loaded");
    config
}

// ─── Host ───────────────────────────────────────────────────────────

/// Non-interactive host: sits at the first root and records what the
/// controller asked it to open.
struct CliHost {
    location: ViewLocation,
    opened: Option<(std::path::PathBuf, Option<usize>)>,
}

impl FilterHost for CliHost {
    fn current_location(&self) -> ViewLocation {
        self.location.clone()
    }

    fn restore_location(&mut self, location: &ViewLocation) {
        self.location = location.clone();
    }

    fn preview_entry(&mut self, entry: &DisplayEntry) {
        debug!(path = %entry.path.display(), line = ?entry.line, "preview");
    }

    fn open_path(&mut self, path: &Path, line: Option<usize>) {
        self.opened = Some((path.to_path_buf(), line));
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_queries(
    common: &CommonArgs,
    mode: FilterMode,
    backend: Option<SearchBackend>,
    queries: &[String],
) -> Result<(), FilterError> {
    let config = load_config(common, backend);
    let roots: Vec<_> = common.roots.iter().map(|r| treefilter::resolve_path(r)).collect();
    if let Some(missing) = roots.iter().find(|r| !r.is_dir()) {
        return Err(FilterError::InvalidArgs(format!("not a directory: {}", missing.display())));
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    let host = CliHost {
        location: ViewLocation::at(roots.first().cloned().unwrap_or_default()),
        opened: None,
    };
    let searcher = searcher_for(config.backend);
    let mut controller = FilterModeController::new(host, &roots, config, searcher);
    controller.set_show_hidden(common.hidden);
    controller.open(mode);

    let start = Instant::now();
    for query in queries {
        controller.apply_query(query, false, mode == FilterMode::Files, false);
    }
    while controller.loading() {
        if interrupted.load(Ordering::SeqCst) {
            controller.close(true, false);
            eprintln!("Interrupted.");
            std::process::exit(130);
        }
        controller.poll_updates(Duration::from_millis(20));
    }
    info!(
        mode = %mode,
        queries = queries.len(),
        searches = controller.searches_started(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "queries settled"
    );

    if common.json {
        print_json(&controller, queries.len() > 1)
    } else {
        print_tree(&controller, queries.len() > 1);
        Ok(())
    }
}

// ─── Output ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Report<'a> {
    mode: FilterMode,
    query: &'a str,
    status: String,
    match_count: usize,
    truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    searches_issued: Option<u64>,
    selected: usize,
    entries: &'a [DisplayEntry],
}

fn print_json<H: FilterHost>(controller: &FilterModeController<H>, replay: bool) -> Result<(), FilterError> {
    let report = Report {
        mode: controller.mode(),
        query: controller.query(),
        status: controller.status_line(),
        match_count: controller.match_count(),
        truncated: controller.truncated(),
        error: controller.error(),
        searches_issued: replay.then(|| controller.searches_started()),
        selected: controller.selected_index(),
        entries: controller.entries(),
    };
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| FilterError::InvalidArgs(format!("cannot serialize result: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn entry_line(entry: &DisplayEntry) -> String {
    let indent = "  ".repeat(entry.depth);
    let name = if entry.depth == 0 {
        entry.path.display().to_string()
    } else {
        entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    match entry.kind {
        EntryKind::SearchHit => format!(
            "{}{}:{}: {}",
            indent,
            entry.line.unwrap_or(0),
            entry.column.unwrap_or(0),
            entry.preview.as_deref().unwrap_or("")
        ),
        EntryKind::Path if entry.is_dir => format!("{}{}/", indent, name),
        EntryKind::Path => format!("{}{}", indent, name),
    }
}

fn print_tree<H: FilterHost>(controller: &FilterModeController<H>, replay: bool) {
    for entry in controller.entries() {
        println!("{}", entry_line(entry));
    }
    let status = controller.status_line();
    if !status.is_empty() {
        eprintln!("{}", status);
    }
    if replay {
        eprintln!("searches issued: {}", controller.searches_started());
    }
}
