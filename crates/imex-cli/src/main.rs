//! IMEx CLI: the `imex` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

const LOG_ENV: &str = "IMEX_LOG";

/// Logs go to stderr so stdout stays clean for reports and `--json`.
fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("imex=debug,warn")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("imex=info,warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let code = match cli.command {
        Commands::Assign {
            store,
            registry,
            institution,
            report_dir,
            events,
            batch_size,
            only,
            dry_run,
            json,
        } => commands::assign::run(commands::assign::Args {
            config: cli.config,
            store,
            registry,
            institution,
            report_dir,
            events,
            batch_size,
            only,
            dry_run,
            json,
        }),

        Commands::Classify { ids, store, json } => {
            commands::classify::run(cli.config, ids, store, json)
        }

        Commands::Status {
            store,
            registry,
            json,
        } => commands::status::run(cli.config, store, registry, json),

        Commands::Init {
            path,
            institution,
            first_id,
            users,
            json,
        } => commands::init::run(path, institution, first_id, users, json),
    };
    std::process::exit(code);
}
