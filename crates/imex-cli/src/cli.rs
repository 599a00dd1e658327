use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(
    name = "imex",
    about = "IMEx identifier allocation and reconciliation for curated publications",
    version
)]
pub struct Cli {
    /// Path to the TOML config
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Log at debug level (overrides IMEX_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assign IMEx identifiers to publications awaiting review
    Assign {
        /// Curation store JSONL (overrides store.path)
        #[arg(long)]
        store: Option<String>,

        /// Registry file (overrides registry.path)
        #[arg(long)]
        registry: Option<String>,

        /// Local institution (overrides registry.institution)
        #[arg(long)]
        institution: Option<String>,

        /// Report directory (overrides report.dir)
        #[arg(long)]
        report_dir: Option<String>,

        /// JSONL event log (overrides report.events)
        #[arg(long)]
        events: Option<String>,

        /// Identifiers reserved per registry call (overrides allocator.batch_size)
        #[arg(long)]
        batch_size: Option<u64>,

        /// Only process these publication accessions (comma-separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Classify and evaluate without reserving identifiers or writing the store
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify publications by their IMEx cross-references (no registry calls)
    Classify {
        /// Publication accessions (default: all awaiting review)
        ids: Vec<String>,

        /// Curation store JSONL (overrides store.path)
        #[arg(long)]
        store: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store and registry state
    Status {
        /// Curation store JSONL (overrides store.path)
        #[arg(long)]
        store: Option<String>,

        /// Registry file (overrides registry.path)
        #[arg(long)]
        registry: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default config, an empty store and a registry file
    Init {
        /// Directory to initialize
        #[arg(default_value = ".")]
        path: String,

        /// Local institution, also used as the registry partner tag
        #[arg(long, default_value = "IntAct")]
        institution: String,

        /// First identifier the new registry hands out
        #[arg(long, default_value_t = 1)]
        first_id: u64,

        /// Registry user allowed to reserve ranges (repeatable)
        #[arg(long = "user")]
        users: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
