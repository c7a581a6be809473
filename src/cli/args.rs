//! CLI argument structs for all subcommands.

use std::path::PathBuf;

use clap::{Args, Parser};

use treefilter::{FilterMode, SearchBackend};

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Workspace root (repeat for several roots)
    #[arg(short = 'r', long = "root", default_value = ".")]
    pub roots: Vec<PathBuf>,

    /// Include dotfiles and .gitignore'd files
    #[arg(long)]
    pub hidden: bool,

    /// Print the result tree as JSON
    #[arg(long)]
    pub json: bool,

    /// Config file (default: <config dir>/treefilter/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (RUST_LOG overrides)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Parser, Debug)]
pub struct ContentArgs {
    /// Text to search for (fixed string, smart case)
    pub query: String,

    /// Per-root search backend (overrides the config file)
    #[arg(long, value_enum)]
    pub backend: Option<SearchBackend>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser, Debug)]
pub struct FilesArgs {
    /// Filename filter (substring, falling back to fuzzy)
    pub query: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Successive prompt contents, as if typed one after another
    #[arg(required = true)]
    pub queries: Vec<String>,

    /// Filter mode to replay in
    #[arg(long, value_enum, default_value = "content")]
    pub mode: FilterMode,

    /// Per-root search backend (overrides the config file)
    #[arg(long, value_enum)]
    pub backend: Option<SearchBackend>,

    #[command(flatten)]
    pub common: CommonArgs,
}
