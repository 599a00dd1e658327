use crate::support::{
    EXIT_STARTUP, fail_startup, load_config_or_exit, open_store_or_exit, print_json, yes_no,
};
use imex_central::{FileRegistry, RangeAllocator};
use imex_engine::{
    Cancellation, Coordinator, CoordinatorConfig, EventCollector, EventLog, Notifier,
    ReportDirectory, RunSummary,
};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, warn};

pub struct Args {
    pub config: String,
    pub store: Option<String>,
    pub registry: Option<String>,
    pub institution: Option<String>,
    pub report_dir: Option<String>,
    pub events: Option<String>,
    pub batch_size: Option<u64>,
    pub only: Vec<String>,
    pub dry_run: bool,
    pub json: bool,
}

pub fn run(args: Args) -> i32 {
    let mut config = load_config_or_exit(&args.config);
    if let Some(store) = args.store {
        config.store.path = PathBuf::from(store);
    }
    if let Some(registry) = args.registry {
        config.registry.path = PathBuf::from(registry);
    }
    if let Some(institution) = args.institution {
        config.registry.institution = institution;
    }
    if let Some(dir) = args.report_dir {
        config.report.dir = PathBuf::from(dir);
    }
    if let Some(events) = args.events {
        config.report.events = Some(PathBuf::from(events));
    }
    if let Some(batch_size) = args.batch_size {
        config.allocator.batch_size = batch_size;
    }
    config.validate().unwrap_or_else(|e| fail_startup(e));
    let retry = config.retry_policy().unwrap_or_else(|e| fail_startup(e));
    let credentials = config.credentials().unwrap_or_else(|e| fail_startup(e));

    let store = open_store_or_exit(&config.store.path);
    let registry = FileRegistry::open(&config.registry.path, credentials).unwrap_or_else(|e| {
        fail_startup(format!(
            "failed to open registry {}: {e}",
            config.registry.path.display()
        ))
    });
    let allocator = RangeAllocator::new(registry, config.allocator.batch_size)
        .unwrap_or_else(|e| fail_startup(e));

    let mut notifier = Notifier::new();
    let report = ReportDirectory::open(&config.report.dir).unwrap_or_else(|e| {
        fail_startup(format!(
            "failed to open report directory {}: {e}",
            config.report.dir.display()
        ))
    });
    notifier.subscribe(report);
    if let Some(events) = &config.report.events {
        let log = EventLog::create(events).unwrap_or_else(|e| {
            fail_startup(format!("failed to open event log {}: {e}", events.display()))
        });
        notifier.subscribe(log);
    }
    let collector = EventCollector::new();
    if args.json {
        notifier.subscribe(collector.clone());
    }

    let coordinator_config = CoordinatorConfig::new(config.registry.institution.clone())
        .with_retry(retry)
        .with_dry_run(args.dry_run)
        .with_only(args.only);
    let cancellation = Cancellation::new();
    let mut coordinator = Coordinator::new(store, allocator, notifier, coordinator_config)
        .with_cancellation(cancellation.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap_or_else(|e| fail_startup(format!("failed to create tokio runtime: {e}")));
    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received; stopping after the current publication");
                cancellation.cancel();
            }
            Err(e) => error!(error = %e, "cannot listen for interrupts"),
        }
    });

    let summary = match coordinator.run() {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("error: {e}");
            runtime.shutdown_background();
            return EXIT_STARTUP;
        }
    };
    runtime.shutdown_background();

    if args.json {
        print_json(&json!({
            "summary": summary,
            "reportDir": config.report.dir.display().to_string(),
            "events": collector.events(),
        }));
    } else {
        print_summary(&summary, &config.report.dir);
    }
    summary.exit_code()
}

fn print_summary(summary: &RunSummary, report_dir: &std::path::Path) {
    let mode = if summary.dry_run { " (dry run)" } else { "" };
    println!("imex assign{mode}");
    println!("  run: {}", summary.run_id);
    println!("  institution: {}", summary.institution);
    println!("  report: {}", report_dir.display());
    println!("  processed: {}", summary.processed);
    println!("  assigned: {}", summary.assigned);
    println!("  skipped: {}", summary.skipped);
    println!("  conflicted: {}", summary.conflicted);
    println!("  ineligible: {}", summary.ineligible);
    println!("  registered elsewhere: {}", summary.registered_elsewhere);
    println!("  errored: {}", summary.errored);
    if summary.dry_run {
        println!("  planned: {}", summary.planned);
    }
    println!("  registry range requests: {}", summary.acquire_calls);
    if summary.subscriber_failures > 0 {
        println!("  report failures: {}", summary.subscriber_failures);
    }
    if let Some(changed) = summary.store_changed() {
        println!("  store changed: {}", yes_no(changed));
    }
    println!("  cancelled: {}", yes_no(summary.cancelled));
    if summary.cancelled {
        println!("  unprocessed: {}", summary.unprocessed);
    }
}
